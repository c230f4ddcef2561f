use std::io::{self, Stderr};
use anyhow::Result;
use askdoc_core::Conversation;
use crossterm::{
    event::{self, Event, KeyEvent, KeyEventKind, MouseEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};

pub type Tui = Terminal<CrosstermBackend<Stderr>>;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize,
    Tick,
    /// The controller published a new conversation state
    Conversation,
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<AppEvent>,
    _tx: mpsc::UnboundedSender<AppEvent>,
}

impl EventHandler {
    pub fn new(mut conversation: watch::Receiver<Conversation>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let _tx = tx.clone();

        // Spawn event reader task
        let tx_events = tx.clone();
        tokio::spawn(async move {
            let mut reader = event::EventStream::new();
            while let Some(evt) = reader.next().await {
                let app_event = match evt {
                    // Only handle key press events, not release
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        Some(AppEvent::Key(key))
                    }
                    Ok(Event::Mouse(mouse)) => Some(AppEvent::Mouse(mouse)),
                    Ok(Event::Resize(_, _)) => Some(AppEvent::Resize),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::warn!(error = %e, "Terminal event stream failed");
                        None
                    }
                };

                if let Some(event) = app_event {
                    if tx_events.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        // Forward state changes so the screen is redrawn as soon as an answer lands
        let tx_state = tx.clone();
        tokio::spawn(async move {
            while conversation.changed().await.is_ok() {
                if tx_state.send(AppEvent::Conversation).is_err() {
                    break;
                }
            }
        });

        // Spawn tick timer for animations (300ms interval)
        let tx_tick = tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(300));
            loop {
                interval.tick().await;
                if tx_tick.send(AppEvent::Tick).is_err() {
                    break;
                }
            }
        });

        Self { rx, _tx }
    }

    pub async fn next(&mut self) -> Option<AppEvent> {
        self.rx.recv().await
    }
}

pub fn init() -> Result<Tui> {
    enable_raw_mode()?;
    // Raw mode is already on, so any later failure must put the terminal back
    undo_on_error(enter_screen(), restore)
}

fn enter_screen() -> Result<Tui> {
    // Mouse capture for wheel scrolling in the chat pane
    execute!(
        io::stderr(),
        EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;

    let backend = CrosstermBackend::new(io::stderr());
    Ok(Terminal::new(backend)?)
}

/// Run `undo` when `result` failed. The original error is the one returned.
fn undo_on_error<T>(result: Result<T>, undo: impl FnOnce() -> Result<()>) -> Result<T> {
    if let Err(cause) = &result {
        if let Err(e) = undo() {
            tracing::warn!(error = %e, cause = %cause, "Failed to restore terminal");
        }
    }
    result
}

/// Undo everything `init` did. Every step is attempted even if an earlier one fails.
pub fn restore() -> Result<()> {
    let mouse = execute!(io::stderr(), crossterm::event::DisableMouseCapture);
    let screen = execute!(io::stderr(), LeaveAlternateScreen);
    let raw = disable_raw_mode();

    mouse?;
    screen?;
    raw?;
    Ok(())
}

/// Install panic hook to restore terminal on panic
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = restore();
        original_hook(panic_info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::Cell;

    #[test]
    fn failed_setup_is_undone_and_keeps_its_error() {
        let undone = Cell::new(false);
        let result: Result<()> = undo_on_error(Err(anyhow!("no alternate screen")), || {
            undone.set(true);
            Ok(())
        });

        assert!(undone.get());
        assert_eq!(result.unwrap_err().to_string(), "no alternate screen");
    }

    #[test]
    fn failing_undo_does_not_mask_setup_error() {
        let result: Result<()> = undo_on_error(Err(anyhow!("setup")), || Err(anyhow!("undo")));
        assert_eq!(result.unwrap_err().to_string(), "setup");
    }

    #[test]
    fn successful_setup_is_left_alone() {
        let undone = Cell::new(false);
        let result = undo_on_error(Ok(7), || {
            undone.set(true);
            Ok(())
        });

        assert_eq!(result.unwrap(), 7);
        assert!(!undone.get());
    }
}
