use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqlitePool};

use super::common::stage_record_from_row;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::StageRecordRepo,
    },
    models::{RecordStage, RecordStatus, StageRecord, StageStats},
};

/// One lifecycle stage table. The three stage tables share a schema, so a
/// single implementation serves all of them, keyed by `stage.table()`.
pub struct SqliteStageRecordRepo {
    pool: SqlitePool,
    stage: RecordStage,
}

impl SqliteStageRecordRepo {
    pub fn new(pool: SqlitePool, stage: RecordStage) -> Self {
        Self { pool, stage }
    }
}

#[async_trait]
impl StageRecordRepo for SqliteStageRecordRepo {
    async fn get_by_visit_id(&self, visit_id: i64) -> DbResult<Option<StageRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT visit_id, report_date, status, created_at, updated_at
            FROM {}
            WHERE visit_id = ?
            "#,
            self.stage.table()
        ))
        .bind(visit_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| stage_record_from_row(self.stage, &row))
            .transpose()
    }

    async fn create(&self, record: StageRecord) -> DbResult<StageRecord> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (visit_id, report_date, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            self.stage.table()
        ))
        .bind(record.id)
        .bind(record.report_date)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::Conflict(
                format!("{} record for visit {} already exists", self.stage, record.id),
            ),
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Validation(format!("Visit {} does not exist", record.id))
            }
            _ => DbError::from(e),
        })?;

        Ok(StageRecord {
            stage: self.stage,
            ..record
        })
    }

    async fn complete(&self, visit_id: i64, report_date: NaiveDate) -> DbResult<StageRecord> {
        let now = Utc::now();

        // Only pending rows move; zero rows affected means missing or already done.
        let result = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET status = ?, report_date = ?, updated_at = ?
            WHERE visit_id = ? AND status = ?
            "#,
            self.stage.table()
        ))
        .bind(RecordStatus::Done.as_str())
        .bind(report_date)
        .bind(now)
        .bind(visit_id)
        .bind(RecordStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_by_visit_id(visit_id).await? {
                Some(_) => Err(DbError::Conflict(format!(
                    "{} record for visit {} is already done",
                    self.stage, visit_id
                ))),
                None => Err(DbError::NotFound),
            };
        }

        self.get_by_visit_id(visit_id).await?.ok_or(DbError::NotFound)
    }

    async fn stats(&self) -> DbResult<StageStats> {
        let row = sqlx::query(&format!(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0) AS done
            FROM {}
            "#,
            self.stage.table()
        ))
        .bind(RecordStatus::Done.as_str())
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        let done: i64 = row.get("done");
        Ok(StageStats {
            total: total as u64,
            done: done as u64,
            pending: (total - done) as u64,
        })
    }
}
