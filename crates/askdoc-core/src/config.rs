use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ai::AskClient;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/ask";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const ENDPOINT_ENV: &str = "ASKDOC_ENDPOINT";
pub const TOKEN_ENV: &str = "ASKDOC_TOKEN";
pub const TIMEOUT_ENV: &str = "ASKDOC_TIMEOUT_SECS";

/// Settings persisted in `<config_dir>/askdoc/config.json`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

/// Per-run values from the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved settings for one run.
#[derive(Clone)]
pub struct Settings {
    pub endpoint: String,
    pub token: String,
    /// `None` when the timeout was set to 0.
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("askdoc").join("config.json"))
    }

    /// Copy every value set in `overrides` into this config.
    pub fn merge(&mut self, overrides: &Overrides) {
        if let Some(endpoint) = &overrides.endpoint {
            self.endpoint = Some(endpoint.clone());
        }
        if let Some(token) = &overrides.token {
            self.token = Some(token.clone());
        }
        if let Some(secs) = overrides.timeout_secs {
            self.request_timeout_secs = Some(secs);
        }
    }

    pub fn resolve(&self, overrides: &Overrides) -> Result<Settings> {
        self.resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolution order: overrides, then `env`, then this file, then defaults.
    pub fn resolve_with<F>(&self, overrides: &Overrides, env: F) -> Result<Settings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint = overrides
            .endpoint
            .clone()
            .or_else(|| env(ENDPOINT_ENV))
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let token = overrides
            .token
            .clone()
            .or_else(|| env(TOKEN_ENV))
            .or_else(|| self.token.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No API token configured. Pass --token, set {}, or run `askdoc config --token <TOKEN>`",
                    TOKEN_ENV
                )
            })?;

        let timeout_secs = match overrides.timeout_secs {
            Some(secs) => secs,
            None => match env(TIMEOUT_ENV) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{} must be a whole number of seconds", TIMEOUT_ENV))?,
                None => self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            },
        };

        Ok(Settings {
            endpoint,
            token,
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }

    /// The token with all but the last four characters hidden.
    pub fn masked_token(&self) -> Option<String> {
        self.token.as_deref().map(mask)
    }
}

impl Settings {
    pub fn client(&self) -> Result<AskClient> {
        match self.request_timeout {
            Some(timeout) => AskClient::with_timeout(&self.endpoint, &self.token, timeout),
            None => Ok(AskClient::new(&self.endpoint, &self.token)),
        }
    }
}

fn mask(token: &str) -> String {
    let count = token.chars().count();
    if count <= 8 {
        return "*".repeat(count);
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn with_token() -> Config {
        Config {
            token: Some("file-token".into()),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = with_token()
            .resolve_with(&Overrides::default(), env_from(&[]))
            .unwrap();

        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.token, "file-token");
        assert_eq!(
            settings.request_timeout,
            Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        );
    }

    #[test]
    fn env_beats_file_and_overrides_beat_env() {
        let config = Config {
            endpoint: Some("http://file/api/ask".into()),
            token: Some("file-token".into()),
            request_timeout_secs: Some(5),
        };
        let env = env_from(&[(ENDPOINT_ENV, "http://env/api/ask"), (TOKEN_ENV, "env-token")]);

        let settings = config.resolve_with(&Overrides::default(), &env).unwrap();
        assert_eq!(settings.endpoint, "http://env/api/ask");
        assert_eq!(settings.token, "env-token");
        assert_eq!(settings.request_timeout, Some(Duration::from_secs(5)));

        let overrides = Overrides {
            token: Some("flag-token".into()),
            timeout_secs: Some(0),
            ..Overrides::default()
        };
        let settings = config.resolve_with(&overrides, &env).unwrap();
        assert_eq!(settings.token, "flag-token");
        assert_eq!(settings.request_timeout, None);
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = Config::new()
            .resolve_with(&Overrides::default(), env_from(&[(TOKEN_ENV, "  ")]))
            .err()
            .unwrap();
        assert!(err.to_string().contains(TOKEN_ENV));
    }

    #[test]
    fn invalid_timeout_env_is_an_error() {
        let result =
            with_token().resolve_with(&Overrides::default(), env_from(&[(TIMEOUT_ENV, "soon")]));
        assert!(result.is_err());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.merge(&Overrides {
            endpoint: Some("http://example/api/ask".into()),
            token: Some("secret".into()),
            timeout_secs: None,
        });
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_loads_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn masked_token_keeps_last_four() {
        let config = Config {
            token: Some("abcdefghijkl".into()),
            ..Config::default()
        };
        assert_eq!(config.masked_token().as_deref(), Some("********ijkl"));
        assert_eq!(mask("short"), "*****");
    }
}
