use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use askdoc_core::{Config, InteractionController, Overrides, Settings};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
#[cfg(test)]
mod testing;
mod tui;
mod ui;

use app::{citation_label, App};
use tui::{EventHandler, Tui};

const LOG_ENV: &str = "ASKDOC_LOG";

#[derive(Parser)]
#[command(name = "askdoc", version)]
#[command(about = "Ask medical questions from the terminal")]
struct Cli {
    /// Question-answering endpoint URL
    #[arg(long, global = true, value_name = "URL")]
    endpoint: Option<String>,
    /// API token sent with every question
    #[arg(long, global = true)]
    token: Option<String>,
    /// Request timeout in seconds (0 disables it)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Save --endpoint, --token and --timeout to the config file, or show it
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_path = init_logging(dirs::data_local_dir());
    tracing::info!("Starting AskDoc v{}", env!("CARGO_PKG_VERSION"));

    let overrides = Overrides {
        endpoint: cli.endpoint,
        token: cli.token,
        timeout_secs: cli.timeout,
    };
    let config = Config::load()?;

    match cli.command {
        None => run_tui(config.resolve(&overrides)?).await,
        Some(Commands::Ask { question }) => {
            let question = question.join(" ");
            ask_once(config.resolve(&overrides)?, &question, log_path.as_deref()).await
        }
        Some(Commands::Config) => update_config(config, &overrides),
    }
}

/// Log to a file; the terminal belongs to the TUI. Returns `None` and keeps
/// running without logs when the file can't be opened.
fn init_logging(data_dir: Option<PathBuf>) -> Option<PathBuf> {
    let (log_path, file) = match open_log_file(data_dir) {
        Ok(opened) => opened,
        Err(e) => {
            eprintln!("Logging disabled: {e:#}");
            return None;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("askdoc=info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .ok()?;

    Some(log_path)
}

fn open_log_file(data_dir: Option<PathBuf>) -> Result<(PathBuf, File)> {
    let log_dir = data_dir
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join("askdoc");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create {}", log_dir.display()))?;

    let log_path = log_dir.join("askdoc.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;
    Ok((log_path, file))
}

async fn run_tui(settings: Settings) -> Result<()> {
    let controller = InteractionController::new(Arc::new(settings.client()?));
    tracing::info!(endpoint = %settings.endpoint, "Opening chat");

    let mut app = App::new(controller.clone(), settings.endpoint.clone());
    let mut events = EventHandler::new(controller.subscribe());

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run_loop(&mut terminal, &mut app, &mut events).await;
    tui::restore()?;

    result
}

async fn run_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}

async fn ask_once(settings: Settings, question: &str, log_path: Option<&Path>) -> Result<()> {
    let controller = InteractionController::new(Arc::new(settings.client()?));

    if !controller.ask(question).await {
        bail!("Question is empty");
    }

    let conversation = controller.snapshot();
    let answer = conversation
        .last_turn()
        .ok_or_else(|| anyhow!("No answer recorded"))?;
    println!("{}", answer.content);

    if !answer.citations.is_empty() {
        println!("\nSources:");
        for citation in &answer.citations {
            println!("{}", citation_label(citation));
        }
    }

    // Only successful exchanges enter the history
    if conversation.history().is_empty() {
        match log_path {
            Some(path) => bail!("Request failed, details in {}", path.display()),
            None => bail!("Request failed"),
        }
    }
    Ok(())
}

fn update_config(mut config: Config, overrides: &Overrides) -> Result<()> {
    let path = Config::config_path()?;

    let changed =
        overrides.endpoint.is_some() || overrides.token.is_some() || overrides.timeout_secs.is_some();
    if changed {
        config.merge(overrides);
        config.save_to(&path)?;
        tracing::info!(path = %path.display(), "Configuration saved");
        println!("Saved {}", path.display());
    }

    println!("endpoint: {}", config.endpoint.as_deref().unwrap_or("(default)"));
    println!(
        "token:    {}",
        config.masked_token().unwrap_or_else(|| "(not set)".to_string())
    );
    match config.request_timeout_secs {
        Some(secs) => println!("timeout:  {}s", secs),
        None => println!("timeout:  (default)"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_joins_unquoted_words() {
        let cli = Cli::parse_from(["askdoc", "ask", "what", "is", "insulin?"]);
        match cli.command {
            Some(Commands::Ask { question }) => assert_eq!(question.join(" "), "what is insulin?"),
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::parse_from(["askdoc", "config", "--token", "abc", "--timeout", "0"]);
        assert!(matches!(cli.command, Some(Commands::Config)));
        assert_eq!(cli.token.as_deref(), Some("abc"));
        assert_eq!(cli.timeout, Some(0));
    }

    #[test]
    fn missing_data_dir_disables_logging() {
        assert!(init_logging(None).is_none());
    }

    #[test]
    fn unwritable_log_dir_disables_logging() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        assert!(open_log_file(Some(blocker.clone())).is_err());
        assert!(init_logging(Some(blocker)).is_none());
    }

    #[test]
    fn log_file_lives_under_askdoc() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _file) = open_log_file(Some(dir.path().to_path_buf())).unwrap();

        assert_eq!(path, dir.path().join("askdoc").join("askdoc.log"));
        assert!(path.is_file());
    }
}
