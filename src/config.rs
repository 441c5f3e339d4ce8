use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MarqueeError, Result};

const DEFAULT_CONFIG_PATH: &str = "marquee.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS (the dashboard dev server). `None` disables CORS.
    pub cors_origin: Option<String>,
    /// Queue comparison requests so two runs never overlap.
    pub serialize_comparisons: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origin: Some("http://localhost:5173".to_string()),
            serialize_comparisons: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub uri: String,
    /// Used when the URI does not name a database.
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            name: "sample_mflix".to_string(),
        }
    }
}

/// Settings for the index comparison experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub source_collection: String,
    pub demo_collection: String,
    pub default_runs: usize,
    /// Documents per `insert_many` when the `$out` copy is unavailable.
    pub copy_batch_size: usize,
    pub default_genre: String,
    pub default_min_year: i64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            source_collection: "movies".to_string(),
            demo_collection: "movies_demo".to_string(),
            default_runs: 5,
            copy_batch_size: 1000,
            default_genre: "Action".to_string(),
            default_min_year: 2010,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration: defaults, then the TOML file (explicit `path`,
    /// else `MARQUEE_CONFIG`, else `marquee.toml` if present), then
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env::var("MARQUEE_CONFIG").ok().map(PathBuf::from));
        let cfg_path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = match fs::read_to_string(&cfg_path) {
            Ok(s) => Self::from_toml_str(&s)?,
            // A missing default file is fine; a missing explicit one is not.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
                Self::default()
            }
            Err(e) => {
                return Err(MarqueeError::Config(format!(
                    "cannot read {}: {e}",
                    cfg_path.display()
                )))
            }
        };

        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| MarqueeError::Config(e.to_string()))
    }

    /// Apply `MONGO_URI`, `PORT` and `MARQUEE_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MONGO_URI") {
            self.database.uri = v;
        }
        if let Some(v) = lookup("MARQUEE_DB_NAME") {
            self.database.name = v;
        }
        if let Some(v) = lookup("MARQUEE_HOST") {
            self.server.host = v;
        }
        if let Some(port) = lookup("MARQUEE_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|v| v.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Some(v) = lookup("MARQUEE_SOURCE_COLLECTION") {
            self.diagnostics.source_collection = v;
        }
        if let Some(v) = lookup("MARQUEE_DEMO_COLLECTION") {
            self.diagnostics.demo_collection = v;
        }
        if let Some(size) =
            lookup("MARQUEE_COPY_BATCH_SIZE").and_then(|v| v.parse::<usize>().ok())
        {
            self.diagnostics.copy_batch_size = size;
        }
        if let Some(v) = lookup("MARQUEE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("MARQUEE_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.diagnostics;
        if d.source_collection.is_empty() || d.demo_collection.is_empty() {
            return Err(MarqueeError::Config("collection names must not be empty".into()));
        }
        if d.source_collection == d.demo_collection {
            return Err(MarqueeError::Config(format!(
                "demo collection must differ from source collection '{}'",
                d.source_collection
            )));
        }
        if d.default_runs == 0 {
            return Err(MarqueeError::Config("diagnostics.default_runs must be >= 1".into()));
        }
        if d.copy_batch_size == 0 {
            return Err(MarqueeError::Config(
                "diagnostics.copy_batch_size must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.diagnostics.source_collection, "movies");
        assert_eq!(config.diagnostics.demo_collection, "movies_demo");
        assert_eq!(config.diagnostics.default_runs, 5);
        assert_eq!(config.diagnostics.copy_batch_size, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [diagnostics]
            demo_collection = "movies_scratch"
            copy_batch_size = 250

            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.diagnostics.demo_collection, "movies_scratch");
        assert_eq!(config.diagnostics.copy_batch_size, 250);
        assert_eq!(config.diagnostics.source_collection, "movies");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MONGO_URI", "mongodb://db:27017/cinema"),
            ("PORT", "8080"),
            ("MARQUEE_COPY_BATCH_SIZE", "not-a-number"),
            ("MARQUEE_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.database.uri, "mongodb://db:27017/cinema");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.diagnostics.copy_batch_size, 1000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validate_rejects_same_collections() {
        let mut config = Config::default();
        config.diagnostics.demo_collection = "movies".into();
        assert!(matches!(config.validate(), Err(MarqueeError::Config(_))));
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml_str("[server]\nport = \"high\"").unwrap_err();
        assert!(matches!(err, MarqueeError::Config(_)));
    }
}
