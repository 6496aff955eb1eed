use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use super::common::visit_from_row;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::VisitRepo,
    },
    models::{CreateVisit, Visit, VisitStatus},
};

const VISIT_COLUMNS: &str =
    "v.id, v.patient_id, v.case_type_id, v.visit_date, v.visit_type, v.status, v.created_at, v.updated_at";

pub struct SqliteVisitRepo {
    pool: SqlitePool,
}

impl SqliteVisitRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VisitRepo for SqliteVisitRepo {
    async fn create(&self, input: CreateVisit) -> DbResult<Visit> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO visits (patient_id, case_type_id, visit_date, visit_type, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.patient_id)
        .bind(input.case_type_id)
        .bind(input.visit_date)
        .bind(&input.visit_type)
        .bind(VisitStatus::Active.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Validation(format!("Case type {} does not exist", input.case_type_id))
            }
            _ => DbError::from(e),
        })?;

        Ok(Visit {
            id: result.last_insert_rowid(),
            patient_id: input.patient_id,
            case_type_id: input.case_type_id,
            visit_date: input.visit_date,
            visit_type: input.visit_type,
            status: VisitStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_visit_by_id(&self, id: i64) -> DbResult<Option<Visit>> {
        let row = sqlx::query(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits v WHERE v.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(visit_from_row).transpose()
    }

    async fn get_active_visits(&self) -> DbResult<Vec<Visit>> {
        let rows = sqlx::query(&format!(
            "SELECT {VISIT_COLUMNS} FROM visits v WHERE v.status = ? ORDER BY v.visit_date, v.id"
        ))
        .bind(VisitStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(visit_from_row).collect()
    }

    async fn get_potentially_expired_visits(
        &self,
        cutoff: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Visit>> {
        // SQLite's year modifier rolls 29 February into 1 March in common
        // years, matching the per-visit policy.
        let rows = sqlx::query(&format!(
            r#"
            SELECT {VISIT_COLUMNS}
            FROM visits v
            JOIN case_types c ON c.id = v.case_type_id
            WHERE v.visit_type NOT IN ('inpatient', 'outpatient')
               OR date(
                    v.visit_date,
                    printf('%+d years',
                        CASE v.visit_type
                            WHEN 'inpatient' THEN c.inactive_inpatient_years
                            ELSE c.inactive_outpatient_years
                        END)
                  ) <= date(?)
            ORDER BY v.visit_date, v.id
            LIMIT ? OFFSET ?
            "#
        ))
        .bind(cutoff)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(visit_from_row).collect()
    }

    async fn get_visit_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visits")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update_visit_status(&self, id: i64, status: VisitStatus) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE visits
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
