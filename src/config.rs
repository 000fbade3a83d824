//! Service configuration.

use crate::error::{StoreResult, ValidationError};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory used when `DB_PATH` is not set.
pub const DEFAULT_DB_DIR: &str = "/data/sqlite";

/// Environment variable naming the database directory.
pub const DB_PATH_ENV: &str = "DB_PATH";

/// Per-call budget when the caller does not pick one.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for the connectivity check made while opening.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

fn default_timeout() -> Duration {
    DEFAULT_QUERY_TIMEOUT
}

/// SQLite Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    /// Schema definition for the database
    #[serde(default)]
    pub schema: Schema,
    /// Time budget for each statement
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<PathBuf>, schema: Schema) -> Self {
        Self {
            db_path: db_path.into(),
            schema,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Config for database `name` inside the directory named by `DB_PATH`
    /// (default [`DEFAULT_DB_DIR`]).
    pub fn from_env(name: &str, schema: Schema) -> StoreResult<Self> {
        let dir = std::env::var_os(DB_PATH_ENV)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_DIR));
        Ok(Self::new(database_file(&dir, name)?, schema))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `<dir>/<name>.sqlite`
pub fn database_file(dir: &Path, name: &str) -> StoreResult<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyDatabaseName.into());
    }
    Ok(dir.join(format!("{name}.sqlite")))
}
