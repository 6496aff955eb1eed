//! Manual lifecycle advances.
//!
//! After the engine opens a pending transfer record, every later step is an
//! administrative action: completing the transfer with its report date, then
//! opening and completing the retention stage, then the destruction stage.
//! Each stage can only be opened once its predecessor is done.

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use crate::{
    db::{DbError, DbPool},
    models::{RecordStage, StageRecord, StageStats},
};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("No {stage} record for visit {visit_id}")]
    NotFound { stage: RecordStage, visit_id: i64 },

    #[error("Invalid transition for visit {visit_id}: {reason}")]
    InvalidTransition { visit_id: i64, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}

pub struct LifecycleService<'a> {
    db: &'a DbPool,
}

impl<'a> LifecycleService<'a> {
    pub fn new(db: &'a DbPool) -> Self {
        Self { db }
    }

    /// Pending -> Done for a media transfer record.
    pub async fn complete_transfer(
        &self,
        visit_id: i64,
        report_date: NaiveDate,
    ) -> Result<StageRecord, LifecycleError> {
        self.complete(RecordStage::Transfer, visit_id, report_date).await
    }

    /// Open a pending retention record. Requires a completed transfer.
    pub async fn open_retention(&self, visit_id: i64) -> Result<StageRecord, LifecycleError> {
        self.open(RecordStage::Retention, visit_id).await
    }

    pub async fn complete_retention(
        &self,
        visit_id: i64,
        report_date: NaiveDate,
    ) -> Result<StageRecord, LifecycleError> {
        self.complete(RecordStage::Retention, visit_id, report_date).await
    }

    /// Open a pending destruction record. Requires a completed retention record.
    pub async fn open_destruction(&self, visit_id: i64) -> Result<StageRecord, LifecycleError> {
        self.open(RecordStage::Destruction, visit_id).await
    }

    pub async fn complete_destruction(
        &self,
        visit_id: i64,
        report_date: NaiveDate,
    ) -> Result<StageRecord, LifecycleError> {
        self.complete(RecordStage::Destruction, visit_id, report_date).await
    }

    /// Totals by status for one stage
    pub async fn stats(&self, stage: RecordStage) -> Result<StageStats, LifecycleError> {
        Ok(self.db.stage_records(stage).stats().await?)
    }

    async fn open(&self, stage: RecordStage, visit_id: i64) -> Result<StageRecord, LifecycleError> {
        if let Some(previous) = stage.predecessor() {
            let record = self
                .db
                .stage_records(previous)
                .get_by_visit_id(visit_id)
                .await?
                .ok_or(LifecycleError::NotFound {
                    stage: previous,
                    visit_id,
                })?;
            if !record.is_done() {
                return Err(LifecycleError::InvalidTransition {
                    visit_id,
                    reason: format!("{} record is still pending", previous),
                });
            }
        }

        let created = self
            .db
            .stage_records(stage)
            .create(StageRecord::pending(stage, visit_id, Utc::now()))
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => LifecycleError::InvalidTransition {
                    visit_id,
                    reason: format!("{} record already exists", stage),
                },
                e => LifecycleError::Store(e),
            })?;

        tracing::info!(visit_id, stage = %stage, "Opened lifecycle stage");
        Ok(created)
    }

    async fn complete(
        &self,
        stage: RecordStage,
        visit_id: i64,
        report_date: NaiveDate,
    ) -> Result<StageRecord, LifecycleError> {
        let record = self
            .db
            .stage_records(stage)
            .complete(visit_id, report_date)
            .await
            .map_err(|e| match e {
                DbError::NotFound => LifecycleError::NotFound { stage, visit_id },
                DbError::Conflict(_) => LifecycleError::InvalidTransition {
                    visit_id,
                    reason: format!("{} record is already done", stage),
                },
                e => LifecycleError::Store(e),
            })?;

        tracing::info!(visit_id, stage = %stage, report_date = %report_date, "Completed lifecycle stage");
        Ok(record)
    }
}
