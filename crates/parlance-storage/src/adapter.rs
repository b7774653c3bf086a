// SPDX-FileCopyrightText: 2026 Parlance Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter and UnitOfWork traits.

use async_trait::async_trait;
use rusqlite::TransactionBehavior;
use tokio::sync::OnceCell;
use tracing::debug;

use parlance_config::model::StorageConfig;
use parlance_core::{
    AdapterType, HealthStatus, ParlanceError, PluginAdapter, StorageAdapter, UnitOfWork, Work,
};

use crate::database::{Database, map_tr_err};
use crate::queries;
use crate::scope::SqliteScope;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle. The database is lazily opened on the first
/// call to [`StorageAdapter::initialize`]. Every unit of work runs on the
/// single tokio-rusqlite thread, so transactions never interleave.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`](StorageAdapter::initialize) is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Create and initialize in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, ParlanceError> {
        let storage = Self::new(config);
        storage.initialize().await?;
        Ok(storage)
    }

    /// Returns a reference to the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, ParlanceError> {
        self.db.get().ok_or_else(|| ParlanceError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Number of messages in each pronunciation status.
    pub async fn status_counts(&self) -> Result<Vec<(String, i64)>, ParlanceError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<_, rusqlite::Error> { queries::messages::count_by_status(conn) })
            .await
            .map_err(map_tr_err)
    }

    /// Rows of `PRAGMA integrity_check`; a single `"ok"` when healthy.
    pub async fn integrity_check(&self) -> Result<Vec<String>, ParlanceError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare("PRAGMA integrity_check")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn checkpoint(&self, db: &Database) -> Result<(), ParlanceError> {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ParlanceError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParlanceError> {
        if let Some(db) = self.db.get() {
            self.checkpoint(db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ParlanceError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| ParlanceError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ParlanceError> {
        let db = self.db()?;
        self.checkpoint(db).await
    }
}

#[async_trait]
impl UnitOfWork for SqliteStorage {
    async fn ambient<R: Send + 'static>(&self, work: Work<R>) -> Result<R, ParlanceError> {
        self.db()?
            .connection()
            .call(move |conn| -> Result<Result<R, ParlanceError>, rusqlite::Error> {
                let mut scope = SqliteScope::new(conn);
                Ok(work(&mut scope))
            })
            .await
            .map_err(map_tr_err)?
    }

    async fn transaction<R: Send + 'static>(&self, work: Work<R>) -> Result<R, ParlanceError> {
        self.db()?
            .connection()
            .call(move |conn| -> Result<Result<R, ParlanceError>, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let outcome = {
                    let mut scope = SqliteScope::new(&tx);
                    work(&mut scope)
                };
                match outcome {
                    Ok(value) => {
                        tx.commit()?;
                        Ok(Ok(value))
                    }
                    Err(e) => {
                        tx.rollback()?;
                        debug!(error = %e, "transaction rolled back");
                        Ok(Err(e))
                    }
                }
            })
            .await
            .map_err(map_tr_err)?
    }
}
