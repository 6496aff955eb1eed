//! Shared database repository test infrastructure
//!
//! Each repository test module contains shared async test functions taking a
//! `&DbPool`. The `backend_tests!` macro instantiates every listed function
//! once against an in-memory SQLite database (with the real migrations) and
//! once against the in-memory backend, so both implementations are held to
//! the same behavior.

/// Generate one `#[tokio::test]` per backend for each shared test function
macro_rules! backend_tests {
    ($($name:ident),* $(,)?) => {
        #[cfg(feature = "database-sqlite")]
        mod sqlite_tests {
            $(
                #[tokio::test]
                async fn $name() {
                    let db = crate::db::tests::harness::create_sqlite_db().await;
                    super::$name(&db).await;
                }
            )*
        }

        mod memory_tests {
            $(
                #[tokio::test]
                async fn $name() {
                    let db = crate::db::DbPool::in_memory();
                    super::$name(&db).await;
                }
            )*
        }
    };
}

mod stage_records;
