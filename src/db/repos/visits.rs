use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    db::error::DbResult,
    models::{CreateVisit, Visit, VisitStatus},
};

/// Repository trait for visit operations used by the retention engine
#[async_trait]
pub trait VisitRepo: Send + Sync {
    /// Register a visit. New visits start `Active`.
    async fn create(&self, input: CreateVisit) -> DbResult<Visit>;

    /// Get a visit by ID
    async fn get_visit_by_id(&self, id: i64) -> DbResult<Option<Visit>>;

    /// All visits currently `Active`, oldest visit date first.
    async fn get_active_visits(&self) -> DbResult<Vec<Visit>>;

    /// One page of visits whose expiration date falls on or before `cutoff`,
    /// ordered by visit date then id.
    ///
    /// The filter ignores visit status and transfer records so that offsets
    /// stay stable while a batch run is transitioning visits. Visits with an
    /// unrecognized visit type have no expiration date and are always
    /// returned, so the caller reports them.
    async fn get_potentially_expired_visits(
        &self,
        cutoff: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Visit>>;

    /// Total number of visits, regardless of status
    async fn get_visit_count(&self) -> DbResult<i64>;

    /// Set the status of a visit. Returns `NotFound` if the visit does not exist.
    async fn update_visit_status(&self, id: i64, status: VisitStatus) -> DbResult<()>;
}
