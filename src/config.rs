//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::graph::BucketId;
use crate::transpiler::{BucketMapping, StaticBuckets, TranspilerConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transpiler: TranspilerSection,

    /// Database/retention policy to bucket mappings
    #[serde(default)]
    pub buckets: Vec<BucketConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Statement defaults
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranspilerSection {
    /// Database used when a FROM clause names none
    pub default_database: Option<String>,

    /// Retention policy used when a FROM clause names none
    pub default_retention_policy: Option<String>,
}

/// One `[[buckets]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct BucketConfig {
    pub database: String,

    /// Omit to match every retention policy of the database
    pub retention_policy: Option<String>,

    pub bucket_id: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("influxql-transpiler").join("config.toml")),
            Some(PathBuf::from("/etc/influxql-transpiler/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(database) = std::env::var("INFLUXQL_TRANSPILER_DATABASE") {
            self.transpiler.default_database = Some(database);
        }
        if let Ok(rp) = std::env::var("INFLUXQL_TRANSPILER_RETENTION_POLICY") {
            self.transpiler.default_retention_policy = Some(rp);
        }

        if let Ok(level) = std::env::var("INFLUXQL_TRANSPILER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("INFLUXQL_TRANSPILER_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Bucket table built from the `[[buckets]]` entries
    pub fn static_buckets(&self) -> StaticBuckets {
        let mut buckets = StaticBuckets::new();
        for entry in &self.buckets {
            buckets.insert(BucketMapping {
                database: entry.database.clone(),
                retention_policy: entry.retention_policy.clone(),
                bucket: BucketId::new(entry.bucket_id.as_str()),
            });
        }
        buckets
    }

    /// Statement defaults for the transpiler
    pub fn transpiler_config(&self) -> TranspilerConfig {
        TranspilerConfig {
            default_database: self.transpiler.default_database.clone(),
            default_retention_policy: self.transpiler.default_retention_policy.clone(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# InfluxQL Transpiler Configuration
#
# Environment variables override these settings:
# - INFLUXQL_TRANSPILER_DATABASE
# - INFLUXQL_TRANSPILER_RETENTION_POLICY
# - INFLUXQL_TRANSPILER_LOG_LEVEL
# - INFLUXQL_TRANSPILER_LOG_FORMAT

[transpiler]
# Database used when a statement's FROM clause names none
# default_database = "telegraf"

# Retention policy used when a statement's FROM clause names none
# default_retention_policy = "autogen"

# Database/retention policy to bucket mappings.
# Omit retention_policy to match every retention policy of the database.
#
# [[buckets]]
# database = "telegraf"
# retention_policy = "autogen"
# bucket_id = "0000000000000001"

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::BucketLookup;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
[transpiler]
default_database = "telegraf"

[[buckets]]
database = "telegraf"
retention_policy = "autogen"
bucket_id = "b1"

[[buckets]]
database = "db0"
bucket_id = "b2"

[logging]
level = "debug"
format = "json"
"#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.transpiler.default_database.as_deref(), Some("telegraf"));
        assert!(config.transpiler.default_retention_policy.is_none());
        assert_eq!(config.buckets.len(), 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");

        let buckets = config.static_buckets();
        assert_eq!(buckets.lookup("telegraf", Some("autogen")), Some(BucketId::new("b1")));
        assert_eq!(buckets.lookup("db0", Some("weekly")), Some(BucketId::new("b2")));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = Config::load(file.path()).unwrap();

        assert!(config.buckets.is_empty());
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_default_parses() {
        let file = write_config(&generate_default_config());
        let config = Config::load(file.path()).unwrap();

        assert!(config.transpiler.default_database.is_none());
        assert!(config.buckets.is_empty());
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_errors() {
        let missing = Config::load(Path::new("/nonexistent/influxql-transpiler.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let file = write_config("[[buckets]]\ndatabase = 1\n");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_transpiler_config() {
        let file = write_config(
            "[transpiler]\ndefault_database = \"db0\"\ndefault_retention_policy = \"autogen\"\n",
        );
        let config = Config::load(file.path()).unwrap().transpiler_config();

        assert_eq!(config.default_database.as_deref(), Some("db0"));
        assert_eq!(config.default_retention_policy.as_deref(), Some("autogen"));
    }
}
