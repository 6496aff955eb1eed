//! The per-visit transition shared by the full scan and the batch path.
//!
//! For an expired active visit the transition makes sure a pending media
//! transfer record exists, then marks the visit inactive. The record is the
//! source of truth for "already processed": it is created at most once and
//! never overwritten. A record found while the visit is still active (a crash
//! between the two writes) only completes the status flip, and an expired
//! visit that is already inactive but has no record still gets one.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use super::{RetentionError, policy};
use crate::{
    db::{CaseTypeRepo, DbError, StageRecordRepo, VisitRepo},
    models::{RecordStage, StageRecord, Visit, VisitStatus},
    observability::metrics,
};

/// What happened to a single visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The visit was already inactive and already has a transfer record.
    AlreadyInactive,
    NotExpired { expires_on: NaiveDate },
    /// A pending transfer record was created and the visit marked inactive.
    Transferred { expires_on: NaiveDate },
    /// A transfer record already existed. The visit is inactive afterwards.
    AlreadyTransferred { expires_on: NaiveDate },
    /// Dry run: the visit would have been transferred.
    WouldTransfer { expires_on: NaiveDate },
}

pub struct Transitioner {
    visits: Arc<dyn VisitRepo>,
    case_types: Arc<dyn CaseTypeRepo>,
    transfers: Arc<dyn StageRecordRepo>,
    dry_run: bool,
}

impl Transitioner {
    pub fn new(
        visits: Arc<dyn VisitRepo>,
        case_types: Arc<dyn CaseTypeRepo>,
        transfers: Arc<dyn StageRecordRepo>,
        dry_run: bool,
    ) -> Self {
        Self {
            visits,
            case_types,
            transfers,
            dry_run,
        }
    }

    /// Evaluate one visit at `now` and apply the transition if it expired.
    pub async fn apply(&self, visit: &Visit, now: DateTime<Utc>) -> Result<Transition, RetentionError> {
        let existing = self.transfers.get_by_visit_id(visit.id).await?;
        if !visit.is_active() && existing.is_some() {
            return Ok(Transition::AlreadyInactive);
        }

        let case = self
            .case_types
            .get_case_by_id(visit.case_type_id)
            .await?
            .ok_or(RetentionError::CaseNotFound(visit.case_type_id))?;

        let decision = policy::evaluate(&case, &visit.visit_type, visit.visit_date, now)?;
        let expires_on = decision.expires_on;
        if !decision.expired {
            return Ok(Transition::NotExpired { expires_on });
        }

        if self.dry_run {
            tracing::info!(
                visit_id = visit.id,
                case_id = case.id,
                expires_on = %expires_on,
                "DRY RUN: Would create transfer record for visit {}",
                visit.id
            );
            return Ok(Transition::WouldTransfer { expires_on });
        }

        let created = match existing {
            Some(_) => false,
            None => {
                let record = StageRecord::pending(RecordStage::Transfer, visit.id, now);
                match self.transfers.create(record).await {
                    Ok(_) => true,
                    // Another trigger created it between our check and insert
                    Err(DbError::Conflict(_)) => false,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if visit.is_active() {
            self.visits
                .update_visit_status(visit.id, VisitStatus::Inactive)
                .await?;
        }

        if created {
            metrics::record_transfer_created();
            tracing::info!(
                visit_id = visit.id,
                case_id = case.id,
                expires_on = %expires_on,
                "Created pending transfer record"
            );
            Ok(Transition::Transferred { expires_on })
        } else {
            tracing::debug!(
                visit_id = visit.id,
                "Transfer record already exists, visit marked inactive"
            );
            Ok(Transition::AlreadyTransferred { expires_on })
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        db::{
            DbPool,
            tests::harness::{date, seed_case, seed_visit},
        },
        models::RecordStatus,
    };

    fn transitioner(db: &DbPool, dry_run: bool) -> Transitioner {
        Transitioner::new(db.visits(), db.case_types(), db.transfer_records(), dry_run)
    }

    fn mid_2024() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_expired_visit_is_transferred() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 2).await;
        let visit = seed_visit(&db, case.id, date(2022, 1, 1), "inpatient").await;

        let t = transitioner(&db, false).apply(&visit, mid_2024()).await.unwrap();
        assert_eq!(
            t,
            Transition::Transferred {
                expires_on: date(2024, 1, 1)
            }
        );

        let record = db.transfer_records().get_by_visit_id(visit.id).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Pending);
        assert!(record.report_date.is_none());

        let visit = db.visits().get_visit_by_id(visit.id).await.unwrap().unwrap();
        assert_eq!(visit.status, VisitStatus::Inactive);
    }

    #[tokio::test]
    async fn test_not_expired_leaves_visit_untouched() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 2).await;
        let visit = seed_visit(&db, case.id, date(2023, 6, 1), "inpatient").await;

        let t = transitioner(&db, false).apply(&visit, mid_2024()).await.unwrap();
        assert_eq!(
            t,
            Transition::NotExpired {
                expires_on: date(2025, 6, 1)
            }
        );
        assert!(db.transfer_records().get_by_visit_id(visit.id).await.unwrap().is_none());
        let visit = db.visits().get_visit_by_id(visit.id).await.unwrap().unwrap();
        assert!(visit.is_active());
    }

    #[tokio::test]
    async fn test_existing_record_completes_flip_without_overwrite() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 2).await;
        let visit = seed_visit(&db, case.id, date(2022, 1, 1), "inpatient").await;

        // Record left behind by an interrupted earlier run, since completed
        db.transfer_records()
            .create(StageRecord::pending(RecordStage::Transfer, visit.id, Utc::now()))
            .await
            .unwrap();
        db.transfer_records()
            .complete(visit.id, date(2024, 3, 1))
            .await
            .unwrap();

        let t = transitioner(&db, false).apply(&visit, mid_2024()).await.unwrap();
        assert!(matches!(t, Transition::AlreadyTransferred { .. }));

        let record = db.transfer_records().get_by_visit_id(visit.id).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Done);
        assert_eq!(record.report_date, Some(date(2024, 3, 1)));

        let visit = db.visits().get_visit_by_id(visit.id).await.unwrap().unwrap();
        assert_eq!(visit.status, VisitStatus::Inactive);
    }

    #[tokio::test]
    async fn test_inactive_visit_with_record_is_skipped() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 2).await;
        let visit = seed_visit(&db, case.id, date(2010, 1, 1), "inpatient").await;
        let t = transitioner(&db, false);
        t.apply(&visit, mid_2024()).await.unwrap();
        let before = db.transfer_records().get_by_visit_id(visit.id).await.unwrap();

        let visit = db.visits().get_visit_by_id(visit.id).await.unwrap().unwrap();
        assert_eq!(t.apply(&visit, mid_2024()).await.unwrap(), Transition::AlreadyInactive);
        assert_eq!(
            db.transfer_records().get_by_visit_id(visit.id).await.unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn test_inactive_expired_visit_without_record_gets_one() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 2).await;
        let visit = seed_visit(&db, case.id, date(2022, 1, 1), "inpatient").await;
        db.visits()
            .update_visit_status(visit.id, VisitStatus::Inactive)
            .await
            .unwrap();
        let visit = db.visits().get_visit_by_id(visit.id).await.unwrap().unwrap();

        let t = transitioner(&db, false).apply(&visit, mid_2024()).await.unwrap();
        assert_eq!(
            t,
            Transition::Transferred {
                expires_on: date(2024, 1, 1)
            }
        );

        let record = db.transfer_records().get_by_visit_id(visit.id).await.unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Pending);
        let visit = db.visits().get_visit_by_id(visit.id).await.unwrap().unwrap();
        assert_eq!(visit.status, VisitStatus::Inactive);
    }

    #[tokio::test]
    async fn test_inactive_unexpired_visit_is_left_alone() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 2).await;
        let visit = seed_visit(&db, case.id, date(2023, 6, 1), "inpatient").await;
        db.visits()
            .update_visit_status(visit.id, VisitStatus::Inactive)
            .await
            .unwrap();
        let visit = db.visits().get_visit_by_id(visit.id).await.unwrap().unwrap();

        let t = transitioner(&db, false).apply(&visit, mid_2024()).await.unwrap();
        assert!(matches!(t, Transition::NotExpired { .. }));
        assert!(db.transfer_records().get_by_visit_id(visit.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 2).await;
        let visit = seed_visit(&db, case.id, date(2022, 1, 1), "inpatient").await;

        let t = transitioner(&db, true).apply(&visit, mid_2024()).await.unwrap();
        assert!(matches!(t, Transition::WouldTransfer { .. }));
        assert!(db.transfer_records().get_by_visit_id(visit.id).await.unwrap().is_none());
        let visit = db.visits().get_visit_by_id(visit.id).await.unwrap().unwrap();
        assert!(visit.is_active());
    }

    #[tokio::test]
    async fn test_unknown_visit_type_fails_without_writes() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 2).await;
        let visit = seed_visit(&db, case.id, date(2010, 1, 1), "emergency").await;

        let err = transitioner(&db, false).apply(&visit, mid_2024()).await.unwrap_err();
        assert!(matches!(err, RetentionError::InvalidVisitType(_)));
        assert!(db.transfer_records().get_by_visit_id(visit.id).await.unwrap().is_none());
        let visit = db.visits().get_visit_by_id(visit.id).await.unwrap().unwrap();
        assert!(visit.is_active());
    }
}
