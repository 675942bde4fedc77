//! Environment-driven runtime configuration.
//!
//! # Responsibility
//! - Resolve database path and logging settings from environment variables.
//! - Open the configured database and start the configured logger.
//! - Keep resolution pure over a lookup function so it can be tested without
//!   touching the process environment.
//!
//! # Invariants
//! - Blank values are treated as unset.
//! - Logging is only initialized when a log directory is configured.

use crate::db::{open_db, DbResult};
use crate::logging::{default_log_level, init_logging};
use rusqlite::Connection;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "LAZYPLAN_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "LAZYPLAN_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "LAZYPLAN_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "lazyplan.sqlite3";

/// Resolved runtime settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl CoreConfig {
    /// Resolves settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|trimmed| !trimmed.is_empty())
        };

        Self {
            db_path: value(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            log_level: value(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: value(LOG_DIR_ENV),
        }
    }

    /// Opens and migrates the database at `db_path`.
    pub fn open_db(&self) -> DbResult<Connection> {
        open_db(&self.db_path)
    }

    /// Starts file logging when a directory is configured.
    ///
    /// Returns `Ok(false)` when logging stays disabled.
    pub fn init_logging(&self) -> Result<bool, String> {
        match self.log_dir.as_deref() {
            Some(log_dir) => init_logging(&self.log_level, log_dir).map(|()| true),
            None => Ok(false),
        }
    }
}
