//! Runtime configuration
//!
//! `SearchConfig` names the store to connect to and the defaults applied to
//! queries. It can be read from a JSON file and is overridden field by field
//! by command-line flags or environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::vector_search::error::StoreError;
use crate::vector_search::DEFAULT_LIMIT;

/// Environment variable holding the store connection string
pub const DATABASE_URL_ENV: &str = "CATALOG_SIMILARITY_DATABASE_URL";

const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// `postgres://…`, `sqlite://path`, a bare file path, or `sqlite::memory:`
    pub database_url: String,
    /// Pool size for pooled backends
    pub max_connections: u32,
    /// Result count when a caller does not give one
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl SearchConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SearchConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_database_url(mut self, database_url: impl Into<String>) -> Self {
        self.database_url = database_url.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::Config("max_connections must be at least 1".to_string()));
        }
        if self.default_limit == 0 {
            return Err(Error::Config("default_limit must be at least 1".to_string()));
        }
        self.store_location()?;
        Ok(())
    }

    pub fn store_location(&self) -> std::result::Result<StoreLocation, StoreError> {
        StoreLocation::parse(&self.database_url)
    }
}

/// Where the backing store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Postgres(String),
    SqliteFile(PathBuf),
    SqliteMemory,
}

impl StoreLocation {
    pub fn parse(url: &str) -> std::result::Result<Self, StoreError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(StoreError::Configuration("database URL is empty".to_string()));
        }

        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return Ok(StoreLocation::Postgres(url.to_string()));
        }

        if matches!(url, "sqlite::memory:" | ":memory:" | "sqlite://:memory:") {
            return Ok(StoreLocation::SqliteMemory);
        }

        if let Some(path) = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:")) {
            if path.is_empty() {
                return Err(StoreError::Configuration(format!("no database path in '{url}'")));
            }
            return Ok(StoreLocation::SqliteFile(PathBuf::from(path)));
        }

        if url.contains("://") {
            return Err(StoreError::Configuration(format!(
                "unsupported database URL scheme in '{url}'"
            )));
        }

        Ok(StoreLocation::SqliteFile(PathBuf::from(url)))
    }
}
