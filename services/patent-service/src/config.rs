//! Application Configuration Module
//!
//! Settings come from environment variables (and a `.env` file when present)
//! and are gathered into one struct that is handed to the server at startup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::Level;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";
pub const DEFAULT_REALTIME_BASE_URL: &str = "wss://api.openai.com/v1";
pub const DEFAULT_DUPLICATE_WINDOW_MS: u64 = 2000;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    bind_address: SocketAddr,
    openai_api_key: String,
    realtime_model: String,
    realtime_base_url: String,
    documents_dir: PathBuf,
    prompts_dir: PathBuf,
    duplicate_window: Duration,
    log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `BIND_ADDRESS`: Address the WebSocket server listens on. Defaults to "0.0.0.0:3000".
    /// *   `OPENAI_API_KEY`: Secret key for the realtime model. Required.
    /// *   `REALTIME_MODEL`: (Optional) Realtime model name.
    /// *   `REALTIME_BASE_URL`: (Optional) WebSocket base URL of the realtime API.
    /// *   `DOCUMENTS_DIR`: (Optional) Where patent drafts are written. Defaults to "patents".
    /// *   `PROMPTS_DIR`: (Optional) Directory holding `instructions.md`. Defaults to "prompts".
    /// *   `DUPLICATE_WINDOW_MS`: (Optional) Duplicate suppression window. Defaults to 2000.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_address_str = var_or("BIND_ADDRESS", DEFAULT_BIND_ADDRESS);
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let window_str = var_or("DUPLICATE_WINDOW_MS", &DEFAULT_DUPLICATE_WINDOW_MS.to_string());
        let duplicate_window = window_str.parse::<u64>().map(Duration::from_millis).map_err(|_| {
            ConfigError::InvalidValue(
                "DUPLICATE_WINDOW_MS".to_string(),
                format!("'{}' is not a number of milliseconds", window_str),
            )
        })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            openai_api_key,
            realtime_model: var_or("REALTIME_MODEL", DEFAULT_REALTIME_MODEL),
            realtime_base_url: var_or("REALTIME_BASE_URL", DEFAULT_REALTIME_BASE_URL),
            documents_dir: PathBuf::from(var_or("DOCUMENTS_DIR", "patents")),
            prompts_dir: PathBuf::from(var_or("PROMPTS_DIR", "prompts")),
            duplicate_window,
            log_level,
        })
    }

    /// Applies command-line overrides on top of the environment.
    pub fn with_overrides(mut self, bind_address: Option<SocketAddr>, documents_dir: Option<PathBuf>) -> Self {
        if let Some(bind_address) = bind_address {
            self.bind_address = bind_address;
        }
        if let Some(documents_dir) = documents_dir {
            self.documents_dir = documents_dir;
        }
        self
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    pub fn openai_api_key(&self) -> &str {
        &self.openai_api_key
    }

    pub fn realtime_model(&self) -> &str {
        &self.realtime_model
    }

    pub fn realtime_base_url(&self) -> &str {
        &self.realtime_base_url
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    pub fn prompts_dir(&self) -> &Path {
        &self.prompts_dir
    }

    pub fn duplicate_window(&self) -> Duration {
        self.duplicate_window
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();

        assert_eq!(config.bind_address(), DEFAULT_BIND_ADDRESS.parse().unwrap());
        assert_eq!(config.realtime_model(), DEFAULT_REALTIME_MODEL);
        assert_eq!(config.documents_dir(), Path::new("patents"));
        assert_eq!(config.duplicate_window(), Duration::from_millis(2000));
        assert_eq!(config.log_level(), Level::INFO);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let result = Config::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")]));
        assert!(matches!(result, Err(ConfigError::MissingVar(var)) if var == "OPENAI_API_KEY"));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let bad_window = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("DUPLICATE_WINDOW_MS", "soon"),
        ]));
        assert!(matches!(bad_window, Err(ConfigError::InvalidValue(var, _)) if var == "DUPLICATE_WINDOW_MS"));

        let bad_level = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("RUST_LOG", "chatty"),
        ]));
        assert!(matches!(bad_level, Err(ConfigError::InvalidValue(var, _)) if var == "RUST_LOG"));
    }

    #[test]
    fn command_line_overrides_environment() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("DOCUMENTS_DIR", "/var/patents"),
        ]))
        .unwrap()
        .with_overrides(Some("127.0.0.1:9000".parse().unwrap()), Some(PathBuf::from("drafts")));

        assert_eq!(config.bind_address().port(), 9000);
        assert_eq!(config.documents_dir(), Path::new("drafts"));
    }
}
