//! Suite Store Library
//!
//! Owns the lifecycle of a test-results database: opens the connection pool,
//! runs migrations, loads test-suite schemas from YAML files and from the
//! metatables, creates the per-suite tables and hands out sessions.

pub mod config;
pub mod infra;
pub mod repository;
pub mod service;
pub mod session;
pub mod testsuite_db;

use tracing::info;

use common::AppResult;

use crate::config::SuiteStoreConfig;
use crate::infra::Database;

pub use crate::infra::DatabaseSettings;
pub use crate::session::Session;
pub use crate::testsuite_db::{SuiteTable, TestSuiteDb};

/// Run migrations (for CLI commands).
pub async fn run_migrations(config: SuiteStoreConfig, action: MigrateAction) -> AppResult<()> {
    let db = Database::connect_without_migrations(&config.database, config.instance).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    db.close().await
}

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

/// One line of the `suites` listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteSummary {
    pub name: String,
    pub origin: String,
    pub machine_fields: usize,
    pub order_fields: usize,
    pub run_fields: usize,
    pub metrics: usize,
}

impl From<&TestSuiteDb> for SuiteSummary {
    fn from(ts: &TestSuiteDb) -> Self {
        let suite = ts.suite();
        Self {
            name: suite.name.clone(),
            origin: ts.origin().to_string(),
            machine_fields: suite.machine_fields.len(),
            order_fields: suite.order_fields.len(),
            run_fields: suite.run_fields.len(),
            metrics: suite.sample_fields.len(),
        }
    }
}

/// Open the database and summarize every loaded test-suite.
pub async fn list_suites(config: SuiteStoreConfig) -> AppResult<Vec<SuiteSummary>> {
    let db = Database::open(&config.database, config.instance, config.baseline_revision).await?;
    let summaries = db.testsuites().values().map(SuiteSummary::from).collect();
    db.close().await?;
    Ok(summaries)
}

/// Open the database, which validates and syncs every schema, then close it.
///
/// Returns the number of loaded test-suites.
pub async fn check_schemas(config: SuiteStoreConfig) -> AppResult<usize> {
    let db = Database::open(&config.database, config.instance, config.baseline_revision).await?;
    let count = db.testsuites().len();
    db.ping().await?;
    db.close().await?;
    Ok(count)
}
