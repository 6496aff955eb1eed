mod error;
pub mod memory;
pub mod repos;
#[cfg(feature = "database-sqlite")]
pub mod sqlite;

#[cfg(test)]
pub mod tests;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;

use crate::{config::DatabaseConfig, models::RecordStage};

/// Cached repository trait objects, created once at startup.
struct CachedRepos {
    visits: Arc<dyn VisitRepo>,
    case_types: Arc<dyn CaseTypeRepo>,
    transfer_records: Arc<dyn StageRecordRepo>,
    retention_records: Arc<dyn StageRecordRepo>,
    destruction_records: Arc<dyn StageRecordRepo>,
}

impl CachedRepos {
    #[cfg(feature = "database-sqlite")]
    fn sqlite(pool: &sqlx::SqlitePool) -> Self {
        Self {
            visits: Arc::new(sqlite::SqliteVisitRepo::new(pool.clone())),
            case_types: Arc::new(sqlite::SqliteCaseTypeRepo::new(pool.clone())),
            transfer_records: Arc::new(sqlite::SqliteStageRecordRepo::new(
                pool.clone(),
                RecordStage::Transfer,
            )),
            retention_records: Arc::new(sqlite::SqliteStageRecordRepo::new(
                pool.clone(),
                RecordStage::Retention,
            )),
            destruction_records: Arc::new(sqlite::SqliteStageRecordRepo::new(
                pool.clone(),
                RecordStage::Destruction,
            )),
        }
    }

    fn memory(tables: &memory::MemoryTables) -> Self {
        Self {
            visits: Arc::new(memory::MemoryVisitRepo::new(tables.clone())),
            case_types: Arc::new(memory::MemoryCaseTypeRepo::new(tables.clone())),
            transfer_records: Arc::new(memory::MemoryStageRecordRepo::new(
                tables.clone(),
                RecordStage::Transfer,
            )),
            retention_records: Arc::new(memory::MemoryStageRecordRepo::new(
                tables.clone(),
                RecordStage::Retention,
            )),
            destruction_records: Arc::new(memory::MemoryStageRecordRepo::new(
                tables.clone(),
                RecordStage::Destruction,
            )),
        }
    }
}

enum PoolStorage {
    #[cfg(feature = "database-sqlite")]
    Sqlite(sqlx::SqlitePool),
    Memory,
}

/// Database pool backed by SQLite or by process memory.
///
/// Repositories are cached at construction time to avoid allocation on each access.
pub struct DbPool {
    inner: PoolStorage,
    repos: CachedRepos,
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool.
    /// Primarily useful for testing.
    #[cfg(feature = "database-sqlite")]
    pub fn from_sqlite(pool: sqlx::SqlitePool) -> Self {
        let repos = CachedRepos::sqlite(&pool);
        DbPool {
            inner: PoolStorage::Sqlite(pool),
            repos,
        }
    }

    /// Create an empty in-memory pool.
    pub fn in_memory() -> Self {
        let tables = memory::MemoryTables::new();
        let repos = CachedRepos::memory(&tables);
        DbPool {
            inner: PoolStorage::Memory,
            repos,
        }
    }

    /// Create a new database pool from configuration
    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        match config {
            DatabaseConfig::Memory => {
                tracing::warn!("Using in-memory storage; nothing will be persisted");
                Ok(Self::in_memory())
            }
            #[cfg(feature = "database-sqlite")]
            DatabaseConfig::Sqlite(cfg) => {
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .connect_with(
                        sqlx::sqlite::SqliteConnectOptions::new()
                            .filename(&cfg.path)
                            .create_if_missing(cfg.create_if_missing)
                            .foreign_keys(true)
                            .journal_mode(if cfg.wal_mode {
                                sqlx::sqlite::SqliteJournalMode::Wal
                            } else {
                                sqlx::sqlite::SqliteJournalMode::Delete
                            })
                            .busy_timeout(std::time::Duration::from_millis(cfg.busy_timeout_ms)),
                    )
                    .await?;

                Ok(Self::from_sqlite(pool))
            }
        }
    }

    /// Run database migrations using sqlx's migration runner.
    /// The in-memory backend has no schema and returns immediately.
    pub async fn run_migrations(&self) -> DbResult<()> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => {
                tracing::info!("Running SQLite migrations");
                sqlx::migrate!("./migrations_sqlx/sqlite").run(pool).await?;
                tracing::info!("SQLite migrations completed successfully");
                Ok(())
            }
            PoolStorage::Memory => Ok(()),
        }
    }

    /// Get visit repository
    pub fn visits(&self) -> Arc<dyn VisitRepo> {
        Arc::clone(&self.repos.visits)
    }

    /// Get case type repository
    pub fn case_types(&self) -> Arc<dyn CaseTypeRepo> {
        Arc::clone(&self.repos.case_types)
    }

    /// Get media transfer record repository
    pub fn transfer_records(&self) -> Arc<dyn StageRecordRepo> {
        Arc::clone(&self.repos.transfer_records)
    }

    /// Get retention record repository
    pub fn retention_records(&self) -> Arc<dyn StageRecordRepo> {
        Arc::clone(&self.repos.retention_records)
    }

    /// Get destruction record repository
    pub fn destruction_records(&self) -> Arc<dyn StageRecordRepo> {
        Arc::clone(&self.repos.destruction_records)
    }

    /// Repository for a lifecycle stage
    pub fn stage_records(&self, stage: RecordStage) -> Arc<dyn StageRecordRepo> {
        match stage {
            RecordStage::Transfer => self.transfer_records(),
            RecordStage::Retention => self.retention_records(),
            RecordStage::Destruction => self.destruction_records(),
        }
    }

    /// Health check for database connectivity
    pub async fn health_check(&self) -> DbResult<()> {
        match &self.inner {
            #[cfg(feature = "database-sqlite")]
            PoolStorage::Sqlite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            }
            PoolStorage::Memory => Ok(()),
        }
    }
}
