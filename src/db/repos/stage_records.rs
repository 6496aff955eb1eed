use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    db::error::DbResult,
    models::{StageRecord, StageStats},
};

/// Repository trait for one lifecycle stage's records (transfer, retention or
/// destruction). Records are keyed by visit id.
#[async_trait]
pub trait StageRecordRepo: Send + Sync {
    /// Get the record for a visit, if one exists
    async fn get_by_visit_id(&self, visit_id: i64) -> DbResult<Option<StageRecord>>;

    /// Insert a record.
    ///
    /// Returns `Conflict` when a record for the same visit already exists;
    /// existing records are never overwritten.
    async fn create(&self, record: StageRecord) -> DbResult<StageRecord>;

    /// Mark a pending record done with the given report date.
    ///
    /// Returns `NotFound` if no record exists and `Conflict` if the record is
    /// already done.
    async fn complete(&self, visit_id: i64, report_date: NaiveDate) -> DbResult<StageRecord>;

    /// Totals by status
    async fn stats(&self) -> DbResult<StageStats>;
}
