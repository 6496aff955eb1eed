use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::{
    db::{error::DbResult, repos::CaseTypeRepo},
    models::{CaseType, CreateCaseType, RetentionPeriods},
};

pub struct SqliteCaseTypeRepo {
    pool: SqlitePool,
}

impl SqliteCaseTypeRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CaseTypeRepo for SqliteCaseTypeRepo {
    async fn create(&self, input: CreateCaseType) -> DbResult<CaseType> {
        let now = Utc::now();
        let periods = input.periods;

        let result = sqlx::query(
            r#"
            INSERT INTO case_types (name, active_inpatient_years, inactive_inpatient_years,
                                    active_outpatient_years, inactive_outpatient_years, notes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.name)
        .bind(periods.active_inpatient_years)
        .bind(periods.inactive_inpatient_years)
        .bind(periods.active_outpatient_years)
        .bind(periods.inactive_outpatient_years)
        .bind(&input.notes)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(CaseType {
            id: result.last_insert_rowid(),
            name: input.name,
            periods,
            notes: input.notes,
            created_at: now,
        })
    }

    async fn get_case_by_id(&self, id: i64) -> DbResult<Option<CaseType>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, active_inpatient_years, inactive_inpatient_years,
                   active_outpatient_years, inactive_outpatient_years, notes, created_at
            FROM case_types
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| CaseType {
            id: row.get("id"),
            name: row.get("name"),
            periods: RetentionPeriods {
                active_inpatient_years: row.get("active_inpatient_years"),
                inactive_inpatient_years: row.get("inactive_inpatient_years"),
                active_outpatient_years: row.get("active_outpatient_years"),
                inactive_outpatient_years: row.get("inactive_outpatient_years"),
            },
            notes: row.get("notes"),
            created_at: row.get("created_at"),
        }))
    }
}
