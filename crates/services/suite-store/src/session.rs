//! Database sessions handed out to calling code.
//!
//! A session shares the pool of the [`Database`](crate::infra::Database) it
//! came from. Work that must be atomic goes through [`Session::transaction`].

use std::future::Future;
use std::pin::Pin;

use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, Statement, TransactionTrait,
};

use common::AppResult;

use crate::repository::SuiteStore;

/// Boxed future returned by transaction closures
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = AppResult<T>> + Send + 'a>>;

/// Unit of work over the shared connection pool.
#[derive(Clone)]
pub struct Session {
    db: DatabaseConnection,
}

impl Session {
    pub(crate) fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get a reference to the underlying connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Suite metatable repository bound to this session
    pub fn suites(&self) -> SuiteStore {
        SuiteStore::new(self.db.clone())
    }

    /// Execute a closure within a transaction.
    ///
    /// The transaction is committed on success and rolled back on error.
    pub async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(&'a DatabaseTransaction) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        let txn = self.db.begin().await?;

        match f(&txn).await {
            Ok(result) => {
                txn.commit().await?;
                Ok(result)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!("Transaction rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Check connectivity by executing a simple query.
    pub async fn ping(&self) -> AppResult<()> {
        self.db
            .execute(Statement::from_string(
                self.db.get_database_backend(),
                "SELECT 1".to_string(),
            ))
            .await?;
        Ok(())
    }
}
