//! Shared configuration structures.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default directory scanned for `*.yaml` schema files
pub const DEFAULT_SCHEMAS_DIR: &str = "schemas";

/// SQLite busy timeout; background tasks may hold transactions open for a long time
pub const DEFAULT_SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// Instance-level configuration handed to the database wrapper.
///
/// Serializable so a database can be reopened elsewhere from its settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstanceConfig {
    /// Directory holding the test-suite schema files
    pub schemas_dir: PathBuf,
    /// Upper bound of the connection pool
    pub max_connections: u32,
    /// Connections kept open by the pool
    pub min_connections: u32,
    /// How long SQLite waits on a locked database, in seconds
    pub sqlite_busy_timeout_secs: u64,
    /// Log every SQL statement through tracing
    pub sql_logging: bool,
}

impl InstanceConfig {
    /// Configuration with the given schemas directory and default pool settings
    pub fn with_schemas_dir(schemas_dir: impl Into<PathBuf>) -> Self {
        Self {
            schemas_dir: schemas_dir.into(),
            ..Self::default()
        }
    }
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            schemas_dir: PathBuf::from(DEFAULT_SCHEMAS_DIR),
            max_connections: 10,
            min_connections: 1,
            sqlite_busy_timeout_secs: DEFAULT_SQLITE_BUSY_TIMEOUT_SECS,
            sql_logging: false,
        }
    }
}
