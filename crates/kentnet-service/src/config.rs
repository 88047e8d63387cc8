//! Server configuration.
//!
//! Settings are layered: the TOML file, then environment variables, then
//! command-line flags (applied by the binary).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use kentnet_types::DEFAULT_RESULT_LIMIT;

/// Largest accepted per-sensor result limit.
pub const MAX_RESULT_LIMIT: u32 = 10_000;
/// Largest accepted number of concurrent per-sensor queries.
pub const MAX_CONCURRENT_QUERIES: usize = 64;

/// Environment variable overriding `server.bind`.
pub const ENV_SERVER_BIND: &str = "SERVERBIND";
/// Environment variable overriding `couch.host`.
pub const ENV_COUCH_HOST: &str = "COUCHHOST";
/// Environment variable overriding `couch.db`.
pub const ENV_COUCH_DB: &str = "COUCHDB";
/// Environment variable overriding `influx.host`.
pub const ENV_INFLUX_HOST: &str = "INFLUXHOST";
/// Environment variable overriding `influx.user`.
pub const ENV_INFLUX_USER: &str = "INFLUXUSER";
/// Environment variable overriding `influx.password`.
pub const ENV_INFLUX_PASSWORD: &str = "INFLUXPWD";
/// Environment variable overriding `influx.db`.
pub const ENV_INFLUX_DB: &str = "INFLUXDB";
/// Environment variable overriding `influx.measurement`.
pub const ENV_INFLUX_MEASUREMENT: &str = "INFLUXMEASUREMENT";

/// Server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Metadata store (CouchDB) settings.
    pub couch: CouchConfig,
    /// Time-series store (InfluxDB) settings.
    pub influx: InfluxConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Override settings from environment-style variables.
    ///
    /// `lookup` returns the value of a variable, if set. Empty values are
    /// ignored. The binary passes `std::env::var`; tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_SERVER_BIND) {
            self.server.bind = v;
        }
        if let Some(v) = get(ENV_COUCH_HOST) {
            self.couch.host = v;
        }
        if let Some(v) = get(ENV_COUCH_DB) {
            self.couch.db = v;
        }
        if let Some(v) = get(ENV_INFLUX_HOST) {
            self.influx.host = v;
        }
        if let Some(v) = get(ENV_INFLUX_USER) {
            self.influx.user = v;
        }
        if let Some(v) = get(ENV_INFLUX_PASSWORD) {
            self.influx.password = v;
        }
        if let Some(v) = get(ENV_INFLUX_DB) {
            self.influx.db = v;
        }
        if let Some(v) = get(ENV_INFLUX_MEASUREMENT) {
            self.influx.measurement = v;
        }
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - Result limit and query concurrency are within bounds
    /// - Store hosts are http(s) URLs and database names are not empty
    /// - Store timeouts are non-zero
    ///
    /// # Example
    ///
    /// ```
    /// use kentnet_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.couch.validate());
        errors.extend(self.influx.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind: String,
    /// Maximum readings returned per sensor.
    pub result_limit: u32,
    /// Maximum per-sensor queries in flight for one request.
    pub max_concurrent_queries: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            result_limit: DEFAULT_RESULT_LIMIT,
            max_concurrent_queries: 8,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError::new(
                "server.bind",
                "bind address cannot be empty",
            ));
        } else {
            match self.bind.rsplit_once(':') {
                None => errors.push(ValidationError::new(
                    "server.bind",
                    format!(
                        "invalid bind address '{}': expected format 'host:port'",
                        self.bind
                    ),
                )),
                Some((_, port)) => match port.parse::<u16>() {
                    Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
                    Err(_) => errors.push(ValidationError::new(
                        "server.bind",
                        format!("invalid port '{}': must be a number 1-65535", port),
                    )),
                    Ok(_) => {}
                },
            }
        }

        if self.result_limit == 0 || self.result_limit > MAX_RESULT_LIMIT {
            errors.push(ValidationError::new(
                "server.result_limit",
                format!(
                    "result limit {} is out of range (1-{})",
                    self.result_limit, MAX_RESULT_LIMIT
                ),
            ));
        }

        if self.max_concurrent_queries == 0 || self.max_concurrent_queries > MAX_CONCURRENT_QUERIES
        {
            errors.push(ValidationError::new(
                "server.max_concurrent_queries",
                format!(
                    "concurrency {} is out of range (1-{})",
                    self.max_concurrent_queries, MAX_CONCURRENT_QUERIES
                ),
            ));
        }

        errors
    }
}

/// CouchDB configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouchConfig {
    /// Server URL.
    pub host: String,
    /// Database holding device and sensor documents.
    pub db: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CouchConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:5984".to_string(),
            db: kentnet_store::DEFAULT_DATABASE.to_string(),
            timeout_secs: 10,
        }
    }
}

impl CouchConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate CouchDB configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        validate_host("couch.host", &self.host, &mut errors);
        if self.db.is_empty() {
            errors.push(ValidationError::new(
                "couch.db",
                "database name cannot be empty",
            ));
        }
        if self.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "couch.timeout_secs",
                "timeout must be at least 1 second",
            ));
        }
        errors
    }
}

/// InfluxDB configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    /// Server URL.
    pub host: String,
    /// Username; empty disables authentication.
    pub user: String,
    pub password: String,
    /// Database holding readings.
    pub db: String,
    /// Measurement holding readings.
    pub measurement: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:8086".to_string(),
            user: String::new(),
            password: String::new(),
            db: kentnet_store::DEFAULT_DATABASE.to_string(),
            measurement: kentnet_store::DEFAULT_MEASUREMENT.to_string(),
            timeout_secs: 10,
        }
    }
}

impl InfluxConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate InfluxDB configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        validate_host("influx.host", &self.host, &mut errors);
        if self.db.is_empty() {
            errors.push(ValidationError::new(
                "influx.db",
                "database name cannot be empty",
            ));
        }
        if self.measurement.is_empty() {
            errors.push(ValidationError::new(
                "influx.measurement",
                "measurement cannot be empty",
            ));
        }
        if self.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "influx.timeout_secs",
                "timeout must be at least 1 second",
            ));
        }
        errors
    }
}

fn validate_host(field: &str, host: &str, errors: &mut Vec<ValidationError>) {
    if host.is_empty() {
        errors.push(ValidationError::new(field, "host cannot be empty"));
    } else if !host.starts_with("http://") && !host.starts_with("https://") {
        errors.push(ValidationError::new(
            field,
            format!("host '{}' must start with http:// or https://", host),
        ));
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `influx.host`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kentnet")
        .join("server.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fields(result: Result<(), ConfigError>) -> Vec<String> {
        match result {
            Err(ConfigError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(()) => Vec::new(),
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.result_limit, 100);
        assert_eq!(config.server.max_concurrent_queries, 8);
        assert_eq!(config.couch.host, "http://localhost:5984");
        assert_eq!(config.couch.db, "kentnetwork");
        assert_eq!(config.influx.measurement, "readings");
        assert_eq!(config.influx.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("server.toml");

        let mut config = Config::default();
        config.server.bind = "0.0.0.0:9090".to_string();
        config.influx.user = "reader".to_string();
        config.influx.password = "secret".to_string();

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/server.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        std::fs::write(&config_path, "this is not valid { toml").unwrap();

        let result = Config::load(&config_path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_config_partial_toml() {
        let toml = r#"
            [server]
            bind = "0.0.0.0:8888"
            result_limit = 500

            [influx]
            host = "https://influx.example.org"
            user = "api"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8888");
        assert_eq!(config.server.result_limit, 500);
        assert_eq!(config.server.max_concurrent_queries, 8);
        assert_eq!(config.influx.host, "https://influx.example.org");
        assert_eq!(config.influx.user, "api");
        assert_eq!(config.influx.db, "kentnetwork");
        assert_eq!(config.couch, CouchConfig::default());
    }

    #[test]
    fn test_load_validated_rejects_bad_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("server.toml");
        std::fs::write(&config_path, "[couch]\nhost = \"localhost:5984\"\n").unwrap();

        let result = Config::load_validated(&config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SERVERBIND", "0.0.0.0:80"),
            ("COUCHHOST", "http://couch:5984"),
            ("COUCHDB", "meta"),
            ("INFLUXHOST", "http://influx:8086"),
            ("INFLUXUSER", "u"),
            ("INFLUXPWD", "p"),
            ("INFLUXDB", "tsdb"),
            ("INFLUXMEASUREMENT", "levels"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.bind, "0.0.0.0:80");
        assert_eq!(config.couch.host, "http://couch:5984");
        assert_eq!(config.couch.db, "meta");
        assert_eq!(config.influx.host, "http://influx:8086");
        assert_eq!(config.influx.user, "u");
        assert_eq!(config.influx.password, "p");
        assert_eq!(config.influx.db, "tsdb");
        assert_eq!(config.influx.measurement, "levels");
    }

    #[test]
    fn test_env_overrides_ignore_empty_and_missing() {
        let mut config = Config::default();
        config.apply_env_overrides(|k| (k == "COUCHDB").then(String::new));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_server_bind_validation() {
        let mut config = Config::default();

        config.server.bind = String::new();
        assert_eq!(fields(config.validate()), vec!["server.bind"]);

        config.server.bind = "localhost".to_string();
        assert_eq!(fields(config.validate()), vec!["server.bind"]);

        config.server.bind = "localhost:0".to_string();
        assert_eq!(fields(config.validate()), vec!["server.bind"]);

        config.server.bind = "localhost:http".to_string();
        assert_eq!(fields(config.validate()), vec!["server.bind"]);

        config.server.bind = "[::1]:8080".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_limits_validation() {
        let mut config = Config::default();
        config.server.result_limit = 0;
        config.server.max_concurrent_queries = MAX_CONCURRENT_QUERIES + 1;
        assert_eq!(
            fields(config.validate()),
            vec!["server.result_limit", "server.max_concurrent_queries"]
        );

        config.server.result_limit = MAX_RESULT_LIMIT;
        config.server.max_concurrent_queries = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_store_validation() {
        let mut config = Config::default();
        config.couch.host = "couch:5984".to_string();
        config.couch.db = String::new();
        config.influx.timeout_secs = 0;
        config.influx.measurement = String::new();

        assert_eq!(
            fields(config.validate()),
            vec![
                "couch.host",
                "couch.db",
                "influx.measurement",
                "influx.timeout_secs"
            ]
        );
    }

    #[test]
    fn test_config_validation_error_display() {
        let mut config = Config::default();
        config.server.bind = "nope".to_string();
        let display = config.validate().unwrap_err().to_string();
        assert!(display.contains("Configuration validation failed"));
        assert!(display.contains("  - server.bind: invalid bind address 'nope'"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("kentnet/server.toml"));
    }
}
