//! Library configuration
//!
//! An optional TOML file controls where the database lives and how long
//! generated reports are kept when the caller sets no explicit expiry:
//!
//! ```toml
//! [storage]
//! db_path = "/var/lib/tally/tally.db"
//!
//! [reports]
//! ttl_days = 30
//! ```
//!
//! Everything falls back to built-in defaults when the file is absent.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Resolved configuration with defaults applied
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file
    pub db_path: PathBuf,
    /// Default lifetime for generated reports when the payload carries no
    /// expiry. `None` means such reports never expire.
    pub report_ttl_days: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            report_ttl_days: None,
        }
    }
}

/// Default database location (~/.local/share/tally/tally.db on Linux)
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
        .join("tally.db")
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config.toml"))
}

impl Config {
    /// Load configuration from the given path, or from the default location,
    /// or fall back to built-in defaults when no file exists.
    pub fn load(override_path: Option<&PathBuf>) -> Result<Self> {
        let path = match override_path {
            Some(p) => Some(p.clone()),
            None => default_config_path(),
        };

        match path {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::parse(&content)
            }
            _ => Ok(Self::default()),
        }
    }

    fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        let mut config = Self::default();
        if let Some(storage) = raw.storage {
            if let Some(db_path) = storage.db_path {
                config.db_path = PathBuf::from(db_path);
            }
        }
        if let Some(reports) = raw.reports {
            if reports.ttl_days.is_some() {
                config.report_ttl_days = reports.ttl_days;
            }
        }
        Ok(config)
    }
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    storage: Option<RawStorage>,
    reports: Option<RawReports>,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    db_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReports {
    ttl_days: Option<u32>,
}
