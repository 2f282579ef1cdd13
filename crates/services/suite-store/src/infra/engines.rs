//! Process-wide bookkeeping of open connection pools.
//!
//! Every [`Database`](super::Database) registers its pool here so that a
//! background-task runner can close all of them at once. Migrations are also
//! tracked per database path so they run at most once per process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use sea_orm::{DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use super::migrations::Migrator;

/// Registry key of one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineId(u64);

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

static ENGINES: Lazy<Mutex<HashMap<EngineId, DatabaseConnection>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Per-path flag telling whether migrations ran, behind its own async lock
static MIGRATED_PATHS: Lazy<Mutex<HashMap<String, Arc<tokio::sync::Mutex<bool>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Track a pool so `close_all` can reach it.
pub fn register(connection: DatabaseConnection) -> EngineId {
    let id = EngineId(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed));
    ENGINES.lock().insert(id, connection);
    id
}

/// Stop tracking a pool. Returns false if it was already gone.
pub fn deregister(id: EngineId) -> bool {
    ENGINES.lock().remove(&id).is_some()
}

/// Number of pools currently tracked
pub fn registered_count() -> usize {
    ENGINES.lock().len()
}

/// Close every tracked pool and forget them. Returns how many were closed.
///
/// Only meant for background-task runners that must drop all handles
/// before exiting; regular code closes its own `Database`.
pub async fn close_all() -> usize {
    let engines = std::mem::take(&mut *ENGINES.lock());
    let count = engines.len();

    for (_, engine) in engines {
        if let Err(e) = engine.close().await {
            tracing::warn!("Failed to close connection pool: {}", e);
        }
    }

    tracing::debug!(count, "Closed all connection pools");
    count
}

fn migration_lock(path: &str) -> Arc<tokio::sync::Mutex<bool>> {
    MIGRATED_PATHS
        .lock()
        .entry(path.to_string())
        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(false)))
        .clone()
}

/// Run pending migrations unless this process already did so for `path`.
///
/// Returns whether migrations ran. Concurrent callers for one path wait for
/// the first; other paths are not held up. A failed run leaves the path
/// unmarked.
pub async fn migrate_once(path: &str, connection: &DatabaseConnection) -> Result<bool, DbErr> {
    let lock = migration_lock(path);
    let mut migrated = lock.lock().await;
    if *migrated {
        return Ok(false);
    }

    Migrator::up(connection, None).await?;
    *migrated = true;
    tracing::info!("Database migrations applied");
    Ok(true)
}

/// Whether migrations already ran for `path` in this process
pub async fn is_migrated(path: &str) -> bool {
    let lock = MIGRATED_PATHS.lock().get(path).cloned();
    match lock {
        Some(lock) => *lock.lock().await,
        None => false,
    }
}

/// Forget that `path` was migrated (after a reset or rollback).
pub async fn forget_migrated(path: &str) {
    let lock = MIGRATED_PATHS.lock().get(path).cloned();
    if let Some(lock) = lock {
        *lock.lock().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, Database};
    use std::time::Duration;

    async fn sqlite(dir: &tempfile::TempDir, file: &str) -> (String, DatabaseConnection) {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join(file).display());
        let conn = Database::connect(&url).await.unwrap();
        (url, conn)
    }

    #[tokio::test]
    async fn test_failed_migration_leaves_path_unmarked() {
        let dir = tempfile::tempdir().unwrap();
        let (url, conn) = sqlite(&dir, "broken.db").await;
        // Same name as a metatable, but without the columns the seed needs
        conn.execute_unprepared("CREATE TABLE sample_types (x INTEGER)")
            .await
            .unwrap();

        assert!(migrate_once(&url, &conn).await.is_err());
        assert!(!is_migrated(&url).await);

        // The next attempt runs the migrations again instead of skipping them
        assert!(migrate_once(&url, &conn).await.is_err());
        assert!(!is_migrated(&url).await);
    }

    #[tokio::test]
    async fn test_migrations_of_other_paths_are_not_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let (busy_url, _busy) = sqlite(&dir, "busy.db").await;
        let (url, conn) = sqlite(&dir, "free.db").await;

        let busy = migration_lock(&busy_url);
        let _held = busy.lock().await;

        let ran = tokio::time::timeout(Duration::from_secs(30), migrate_once(&url, &conn))
            .await
            .expect("migration waited on another path")
            .unwrap();
        assert!(ran);
        assert!(is_migrated(&url).await);
        assert!(!migrate_once(&url, &conn).await.unwrap());

        forget_migrated(&url).await;
        assert!(!is_migrated(&url).await);
    }
}
