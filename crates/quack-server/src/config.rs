//! Configuration for the QuackView server
//!
//! Loads configuration from:
//! 1. config.yaml - operational settings (address, database, analysis defaults, logging)
//! 2. .env file - loaded into the environment by `main`
//!
//! Environment variables always override config.yaml values. A missing
//! config file means defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnvVar { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// DuckDB file; in-memory when unset
    pub path: Option<String>,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Rows returned by `top_k` when the request sets neither limit nor top_k
    pub default_top_k: u64,

    /// Reject results larger than this
    pub max_rows: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_top_k: 10,
            max_rows: Some(100_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

fn parse_env<T: std::str::FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value,
    })
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => serde_yaml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };

        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps variable names to values
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("QUACKVIEW_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("QUACKVIEW_SERVER_PORT") {
            self.server.port = parse_env("QUACKVIEW_SERVER_PORT", port)?;
        }

        if let Some(path) = lookup("QUACKVIEW_DATABASE_PATH") {
            self.database.path = Some(path);
        }
        if let Some(k) = lookup("QUACKVIEW_DEFAULT_TOP_K") {
            self.analysis.default_top_k = parse_env("QUACKVIEW_DEFAULT_TOP_K", k)?;
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(output) = lookup("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.logging.directory = dir;
        }

        Ok(())
    }

    /// Set logging environment variables for the logging module
    pub fn apply_logging_env(&self) {
        std::env::set_var("RUST_LOG", &self.logging.level);
        std::env::set_var("LOG_FORMAT", &self.logging.format);
        std::env::set_var("LOG_OUTPUT", &self.logging.output);
        std::env::set_var("LOG_DIR", &self.logging.directory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, None);
        assert!(!config.database.read_only);
        assert_eq!(config.analysis.default_top_k, 10);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "stdout");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
server:
  port: 3000
database:
  path: "data/sales.duckdb"
  read_only: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.path.as_deref(), Some("data/sales.duckdb"));
        assert!(config.database.read_only);
        assert_eq!(config.analysis, AnalysisConfig::default());
    }

    #[test]
    fn test_env_var_override() {
        let mut config = Config::default();
        config
            .apply_overrides(env(&[
                ("QUACKVIEW_SERVER_PORT", "9090"),
                ("QUACKVIEW_DATABASE_PATH", "/tmp/q.duckdb"),
                ("QUACKVIEW_DEFAULT_TOP_K", "25"),
                ("LOG_FORMAT", "json"),
            ]))
            .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.path.as_deref(), Some("/tmp/q.duckdb"));
        assert_eq!(config.analysis.default_top_k, 25);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_invalid_env_var() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(env(&[("QUACKVIEW_SERVER_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref name, .. } if name == "QUACKVIEW_SERVER_PORT"));
    }

    #[test]
    fn test_load_from_file() {
        let config_yaml = r#"
server:
  host: "0.0.0.0"
  port: 8181
analysis:
  default_top_k: 5
  max_rows: 1000
logging:
  level: "debug"
  format: "compact"
  output: "stdout"
  directory: "./logs"
"#;
        let temp_file = std::env::temp_dir().join(format!("quackview_config_{}.yaml", std::process::id()));
        std::fs::write(&temp_file, config_yaml).unwrap();

        let mut config: Config = serde_yaml::from_str(&std::fs::read_to_string(&temp_file).unwrap()).unwrap();
        config.apply_overrides(env(&[])).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.analysis.max_rows, Some(1000));
        assert_eq!(config.logging.format, "compact");

        assert!(Config::load(&temp_file).is_ok());
        std::fs::remove_file(temp_file).ok();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("quackview_missing_config.yaml");
        let config = Config::load(path);
        assert!(config.is_ok());
    }
}
