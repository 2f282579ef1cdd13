//! Suite store configuration.

use std::env;
use std::path::PathBuf;

use common::{InstanceConfig, DEFAULT_SCHEMAS_DIR};

use crate::infra::DEFAULT_BASELINE_REVISION;

/// Default database when none is configured: a SQLite file in the working directory
pub const DEFAULT_DATABASE: &str = "suite-store.db";

/// Suite store configuration.
#[derive(Clone)]
pub struct SuiteStoreConfig {
    /// Database URL or SQLite file path
    pub database: String,
    /// Baseline revision handed to the database wrapper
    pub baseline_revision: i32,
    /// Instance settings (schemas directory, pool sizes)
    pub instance: InstanceConfig,
}

impl std::fmt::Debug for SuiteStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteStoreConfig")
            .field("database", &"[REDACTED]")
            .field("baseline_revision", &self.baseline_revision)
            .field("instance", &self.instance)
            .finish()
    }
}

impl SuiteStoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = InstanceConfig::default();
        Self {
            database: env::var("SUITE_STORE_DATABASE")
                .or_else(|_| env::var("DATABASE_URL"))
                .unwrap_or_else(|_| DEFAULT_DATABASE.to_string()),
            baseline_revision: env::var("SUITE_STORE_BASELINE_REVISION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_BASELINE_REVISION),
            instance: InstanceConfig {
                schemas_dir: env::var("SUITE_STORE_SCHEMAS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_SCHEMAS_DIR)),
                max_connections: env::var("SUITE_STORE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.max_connections),
                sql_logging: env::var("SUITE_STORE_SQL_LOGGING")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(defaults.sql_logging),
                ..defaults
            },
        }
    }

    /// Override values given on the command line.
    pub fn with_overrides(mut self, database: Option<String>, schemas_dir: Option<PathBuf>) -> Self {
        if let Some(database) = database {
            self.database = database;
        }
        if let Some(dir) = schemas_dir {
            self.instance.schemas_dir = dir;
        }
        self
    }
}

impl Default for SuiteStoreConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            baseline_revision: DEFAULT_BASELINE_REVISION,
            instance: InstanceConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_only_given_values() {
        let config = SuiteStoreConfig::default()
            .with_overrides(None, Some(PathBuf::from("/etc/lnt/schemas")));

        assert_eq!(config.database, DEFAULT_DATABASE);
        assert_eq!(config.instance.schemas_dir, PathBuf::from("/etc/lnt/schemas"));
    }

    #[test]
    fn test_debug_redacts_database() {
        let config = SuiteStoreConfig::default()
            .with_overrides(Some("postgres://user:secret@db/lnt".to_string()), None);

        assert!(!format!("{:?}", config).contains("secret"));
    }
}
