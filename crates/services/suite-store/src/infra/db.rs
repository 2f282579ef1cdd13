//! Database connection, migrations and test-suite loading.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database as SeaDatabase, DatabaseConnection, DbErr, Statement,
};
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};

use common::{AppResult, InstanceConfig};

use super::engines::{self, EngineId};
use super::migrations::Migrator;
use crate::service::SchemaLoader;
use crate::session::Session;
use crate::testsuite_db::TestSuiteDb;

/// Baseline revision used when none is given
pub const DEFAULT_BASELINE_REVISION: i32 = 0;

/// Everything needed to reopen a [`Database`] elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database URL (plain paths already normalized to SQLite URLs)
    pub path: String,
    pub config: InstanceConfig,
    pub baseline_revision: i32,
}

/// True when `path` names no database type and is taken as a SQLite file.
pub fn path_has_no_database_type(path: &str) -> bool {
    !path.contains("://")
}

/// Turn a bare file path into a SQLite URL that creates the file if needed.
pub fn database_url(path: &str) -> String {
    if path_has_no_database_type(path) {
        format!("sqlite://{}?mode=rwc", path)
    } else {
        path.to_string()
    }
}

/// Database wrapper: connection pool, migrations and the loaded test-suites.
#[derive(Clone)]
pub struct Database {
    path: String,
    config: InstanceConfig,
    baseline_revision: i32,
    connection: DatabaseConnection,
    engine: EngineId,
    testsuites: BTreeMap<String, TestSuiteDb>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &"[REDACTED]")
            .field("config", &self.config)
            .field("baseline_revision", &self.baseline_revision)
            .field("testsuites", &self.testsuites.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Database {
    /// Open the database, migrate it and load all test-suites.
    ///
    /// A schema file that fails to load makes the whole open fail; the pool
    /// is closed again before the error is returned.
    pub async fn open(
        path: &str,
        config: InstanceConfig,
        baseline_revision: i32,
    ) -> AppResult<Self> {
        let path = database_url(path);
        let connection = connect(&path, &config).await?;
        let engine = engines::register(connection.clone());

        let testsuites = match prepare(&path, &connection, &config).await {
            Ok(testsuites) => testsuites,
            Err(e) => {
                engines::deregister(engine);
                if let Err(close_err) = connection.close().await {
                    tracing::warn!("Failed to close connection pool: {}", close_err);
                }
                return Err(e);
            }
        };
        tracing::info!(
            backend = ?connection.get_database_backend(),
            suites = testsuites.len(),
            "Database opened"
        );

        Ok(Self {
            path,
            config,
            baseline_revision,
            connection,
            engine,
            testsuites,
        })
    }

    /// Reopen a database from the settings of another instance.
    pub async fn open_with_settings(settings: DatabaseSettings) -> AppResult<Self> {
        Self::open(&settings.path, settings.config, settings.baseline_revision).await
    }

    /// Connect without running migrations or loading suites (for CLI commands).
    pub async fn connect_without_migrations(
        path: &str,
        config: InstanceConfig,
    ) -> AppResult<Self> {
        let path = database_url(path);
        let connection = connect(&path, &config).await?;
        let engine = engines::register(connection.clone());

        Ok(Self {
            path,
            config,
            baseline_revision: DEFAULT_BASELINE_REVISION,
            connection,
            engine,
            testsuites: BTreeMap::new(),
        })
    }

    /// Start a new session on the shared pool.
    pub fn make_session(&self) -> Session {
        Session::new(self.connection.clone())
    }

    /// Close this instance's connection pool and drop it from the registry.
    pub async fn close(&self) -> AppResult<()> {
        engines::deregister(self.engine);
        self.connection.close_by_ref().await?;
        Ok(())
    }

    /// Close the pools of every database opened in this process.
    ///
    /// Meant for background-task runners only; everything else should
    /// call [`Database::close`].
    pub async fn close_all_engines() -> usize {
        engines::close_all().await
    }

    /// All the settings needed to recreate this instance elsewhere.
    pub fn settings(&self) -> DatabaseSettings {
        DatabaseSettings {
            path: self.path.clone(),
            config: self.config.clone(),
            baseline_revision: self.baseline_revision,
        }
    }

    pub fn baseline_revision(&self) -> i32 {
        self.baseline_revision
    }

    /// Look up a loaded test-suite by name.
    pub fn testsuite(&self, name: &str) -> Option<&TestSuiteDb> {
        self.testsuites.get(name)
    }

    /// All loaded test-suites, keyed by name.
    pub fn testsuites(&self) -> &BTreeMap<String, TestSuiteDb> {
        &self.testsuites
    }

    /// Names of all loaded test-suites, sorted.
    pub fn suite_names(&self) -> Vec<&str> {
        self.testsuites.keys().map(String::as_str).collect()
    }

    /// Get a reference to the database connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// Run pending migrations.
    pub async fn run_migrations(&self) -> Result<(), DbErr> {
        Migrator::up(&self.connection, None).await
    }

    /// Rollback the last migration.
    pub async fn rollback_migration(&self) -> Result<(), DbErr> {
        Migrator::down(&self.connection, Some(1)).await?;
        engines::forget_migrated(&self.path).await;
        Ok(())
    }

    /// Get migration status (list all migrations with applied status).
    pub async fn migration_status(&self) -> Result<Vec<(String, bool)>, DbErr> {
        use sea_orm::{EntityTrait, QueryOrder};
        use sea_orm_migration::seaql_migrations;

        // Get applied migrations from database
        let applied: std::collections::HashSet<String> = seaql_migrations::Entity::find()
            .order_by_asc(seaql_migrations::Column::Version)
            .all(&self.connection)
            .await?
            .into_iter()
            .map(|m| m.version)
            .collect();

        // Map all defined migrations with their applied status
        let migrations: Vec<(String, bool)> = Migrator::migrations()
            .iter()
            .map(|m| {
                let name = m.name().to_string();
                let is_applied = applied.contains(&name);
                (name, is_applied)
            })
            .collect();

        Ok(migrations)
    }

    /// Reset database and run all migrations fresh.
    pub async fn fresh_migrations(&self) -> Result<(), DbErr> {
        Migrator::fresh(&self.connection).await
    }

    /// Check database connectivity by executing a simple query.
    pub async fn ping(&self) -> Result<(), DbErr> {
        self.connection
            .execute(Statement::from_string(
                self.connection.get_database_backend(),
                "SELECT 1".to_string(),
            ))
            .await?;
        Ok(())
    }
}

async fn connect(url: &str, config: &InstanceConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_string());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(config.sql_logging);

    if url.starts_with("sqlite:") {
        let busy_timeout = Duration::from_secs(config.sqlite_busy_timeout_secs);
        options.map_sqlx_sqlite_opts(move |opts| opts.busy_timeout(busy_timeout));
    }

    SeaDatabase::connect(options).await
}

/// Migrate the database, then load every suite.
///
/// File-backed suites get their tables while being registered.
async fn prepare(
    path: &str,
    connection: &DatabaseConnection,
    config: &InstanceConfig,
) -> AppResult<BTreeMap<String, TestSuiteDb>> {
    engines::migrate_once(path, connection).await?;

    let session = Session::new(connection.clone());
    let loader = SchemaLoader::new(Arc::new(session.suites()), config.schemas_dir.clone());

    Ok(loader
        .load_all()
        .await?
        .into_iter()
        .map(|loaded| {
            let ts = TestSuiteDb::from(loaded);
            (ts.name().to_string(), ts)
        })
        .collect())
}
