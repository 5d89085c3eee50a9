//! Configuration file (`sqlweave.toml`).
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [[database]]
//! name = "main"
//! dsn = "mysql://root:pw@127.0.0.1:3306/app"
//! max_conns = 10
//! max_idles = 2
//! max_lifetime = 3600
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::PoolSettings;
use crate::error::{WeaveError, WeaveResult};

/// File name searched in the working directory.
pub const LOCAL_CONFIG: &str = "sqlweave.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    #[serde(rename = "database")]
    pub databases: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One named MySQL connection.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub name: String,
    pub dsn: String,
    #[serde(default = "default_max_conns")]
    pub max_conns: u32,
    #[serde(default)]
    pub max_idles: u32,
    /// Connection lifetime in seconds; `0` keeps connections forever.
    #[serde(default)]
    pub max_lifetime: u64,
}

fn default_max_conns() -> u32 {
    10
}

impl DatabaseConfig {
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_conns: self.max_conns,
            min_idle: self.max_idles.min(self.max_conns),
            max_lifetime: (self.max_lifetime > 0).then(|| Duration::from_secs(self.max_lifetime)),
        }
    }
}

impl Config {
    /// Parse configuration text.
    pub fn from_toml(text: &str) -> WeaveResult<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> WeaveResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text).map_err(|e| match e {
            WeaveError::Config(msg) => WeaveError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Load from `explicit`, else `./sqlweave.toml`, else the user config
    /// directory. With no explicit path, a missing file yields the default.
    pub fn load(explicit: Option<&Path>) -> WeaveResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::candidates().into_iter().find(|p| p.is_file()) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("sqlweave").join("config.toml"));
        }
        paths
    }

    fn validate(&self) -> WeaveResult<()> {
        for db in &self.databases {
            if db.name.trim().is_empty() {
                return Err(WeaveError::Config("database entry without a name".to_string()));
            }
            if db.dsn.trim().is_empty() {
                return Err(WeaveError::Config(format!("database '{}' has an empty dsn", db.name)));
            }
        }
        Ok(())
    }

    /// Entry for `name`. Duplicate names resolve to the last entry.
    pub fn database(&self, name: &str) -> Option<&DatabaseConfig> {
        self.databases.iter().rev().find(|db| db.name == name)
    }
}
