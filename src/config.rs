use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
///
/// Must run while the process is still single-threaded, i.e. before a
/// multi-threaded tokio runtime is built.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = &value[1..value.len() - 1];
            }

            // Only set if not already set (env vars take precedence)
            if std::env::var(key).is_err() {
                // SAFETY: callers run this before any other thread is spawned
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How long `invoke_async` waits before canceling the request
    pub response_timeout_ms: u64,
    /// Capacity of the outbound request channel
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger filter, e.g. "info" or "matter_cluster_client=debug"
    pub filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: 30_000,
            channel_capacity: 32,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `MATTER_*` environment variables. Unparsable values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(timeout) = std::env::var("MATTER_RESPONSE_TIMEOUT_MS")
            && let Ok(t) = timeout.parse()
        {
            self.client.response_timeout_ms = t;
        }
        if let Ok(capacity) = std::env::var("MATTER_CHANNEL_CAPACITY")
            && let Ok(c) = capacity.parse()
        {
            self.client.channel_capacity = c;
        }
        if let Ok(filter) = std::env::var("MATTER_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/matter-cluster-client/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("matter-cluster-client").join("config.json"))
    }

    /// Default file if present, then environment overrides.
    pub fn load_or_default() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.client.response_timeout_ms == 0 {
            return Err(ClientError::Config(
                "response_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.client.channel_capacity == 0 {
            return Err(ClientError::Config(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"client": {"response_timeout_ms": 500}}"#).unwrap();
        assert_eq!(config.client.response_timeout(), Duration::from_millis(500));
        assert_eq!(config.client.channel_capacity, 32);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.client.response_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Config::load(Path::new("/nonexistent/matter-cluster-client.json"));
        assert!(matches!(result, Err(ClientError::IoError(_))));
    }
}
