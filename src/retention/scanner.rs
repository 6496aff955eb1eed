//! Full scan over active visits, and single-visit processing.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{RetentionError, Transition, Transitioner};
use crate::{db::VisitRepo, observability::metrics};

/// Per-outcome counts of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub scanned: u64,
    pub transferred: u64,
    pub already_transferred: u64,
    pub not_expired: u64,
    pub already_inactive: u64,
    pub would_transfer: u64,
    pub failed: u64,
}

impl ScanReport {
    pub fn record(&mut self, transition: &Transition) {
        match transition {
            Transition::AlreadyInactive => self.already_inactive += 1,
            Transition::NotExpired { .. } => self.not_expired += 1,
            Transition::Transferred { .. } => self.transferred += 1,
            Transition::AlreadyTransferred { .. } => self.already_transferred += 1,
            Transition::WouldTransfer { .. } => self.would_transfer += 1,
        }
    }

    pub fn merge(&mut self, other: &ScanReport) {
        self.scanned += other.scanned;
        self.transferred += other.transferred;
        self.already_transferred += other.already_transferred;
        self.not_expired += other.not_expired;
        self.already_inactive += other.already_inactive;
        self.would_transfer += other.would_transfer;
        self.failed += other.failed;
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

pub struct ExpirationScanner {
    visits: Arc<dyn VisitRepo>,
    transitioner: Arc<Transitioner>,
}

impl ExpirationScanner {
    pub fn new(visits: Arc<dyn VisitRepo>, transitioner: Arc<Transitioner>) -> Self {
        Self {
            visits,
            transitioner,
        }
    }

    /// Evaluate every active visit once, transferring the expired ones.
    ///
    /// Per-visit failures are logged and counted, and the scan moves on.
    /// Only a failure to load the visit list, or cancellation, fails the scan.
    pub async fn run_full_scan(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, RetentionError> {
        let visits = self.visits.get_active_visits().await?;
        tracing::debug!(count = visits.len(), "Loaded active visits");

        let mut report = ScanReport::default();
        for visit in &visits {
            if cancel.is_cancelled() {
                tracing::warn!(
                    scanned = report.scanned,
                    remaining = visits.len() as u64 - report.scanned,
                    "Full scan cancelled"
                );
                return Err(RetentionError::Cancelled);
            }

            report.scanned += 1;
            match self.transitioner.apply(visit, Utc::now()).await {
                Ok(transition) => report.record(&transition),
                Err(e) => {
                    report.failed += 1;
                    metrics::record_visit_failure(e.kind().as_str());
                    tracing::warn!(visit_id = visit.id, error = %e, "Failed to process visit");
                }
            }
        }

        Ok(report)
    }

    /// Evaluate one visit and transfer it if it has expired.
    ///
    /// Unlike the scan paths, an inactive visit is a no-op here even when it
    /// has no transfer record: the admin action only moves active visits.
    pub async fn process_one(&self, visit_id: i64) -> Result<Transition, RetentionError> {
        let visit = self
            .visits
            .get_visit_by_id(visit_id)
            .await?
            .ok_or(RetentionError::VisitNotFound(visit_id))?;

        if !visit.is_active() {
            return Ok(Transition::AlreadyInactive);
        }
        self.transitioner.apply(&visit, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            DbPool,
            tests::harness::{date, months_ago, seed_case, seed_visit},
        },
        models::{RecordStatus, VisitStatus},
    };

    fn scanner(db: &DbPool) -> ExpirationScanner {
        let transitioner = Arc::new(Transitioner::new(
            db.visits(),
            db.case_types(),
            db.transfer_records(),
            false,
        ));
        ExpirationScanner::new(db.visits(), transitioner)
    }

    #[tokio::test]
    async fn test_full_scan_transfers_only_expired() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 1).await;
        let old = seed_visit(&db, case.id, date(2015, 1, 1), "inpatient").await;
        let old_outpatient = seed_visit(&db, case.id, months_ago(18), "outpatient").await;
        let recent = seed_visit(&db, case.id, months_ago(6), "inpatient").await;

        let report = scanner(&db)
            .run_full_scan(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.transferred, 2);
        assert_eq!(report.not_expired, 1);
        assert!(!report.has_failures());

        for id in [old.id, old_outpatient.id] {
            let record = db.transfer_records().get_by_visit_id(id).await.unwrap().unwrap();
            assert_eq!(record.status, RecordStatus::Pending);
            let visit = db.visits().get_visit_by_id(id).await.unwrap().unwrap();
            assert_eq!(visit.status, VisitStatus::Inactive);
        }
        assert!(db.transfer_records().get_by_visit_id(recent.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_scan_creates_no_duplicates() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 1, 1).await;
        for day in 1..=5 {
            seed_visit(&db, case.id, date(2016, 1, day), "inpatient").await;
        }

        let s = scanner(&db);
        let first = s.run_full_scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(first.transferred, 5);

        // All visits are inactive now, so the second scan has nothing to load
        let second = s.run_full_scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(second, ScanReport::default());

        let stats = db.transfer_records().stats().await.unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.pending, 5);
    }

    #[tokio::test]
    async fn test_failing_visit_does_not_stop_scan() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 1, 1).await;
        let bad = seed_visit(&db, case.id, date(2016, 1, 1), "emergency").await;
        let good = seed_visit(&db, case.id, date(2016, 1, 2), "outpatient").await;

        let report = scanner(&db)
            .run_full_scan(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.transferred, 1);

        let bad = db.visits().get_visit_by_id(bad.id).await.unwrap().unwrap();
        assert!(bad.is_active());
        assert!(db.transfer_records().get_by_visit_id(good.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_scan_stops() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 1, 1).await;
        let visit = seed_visit(&db, case.id, date(2016, 1, 1), "inpatient").await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scanner(&db).run_full_scan(&cancel).await.unwrap_err();
        assert!(matches!(err, RetentionError::Cancelled));
        assert!(db.transfer_records().get_by_visit_id(visit.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_process_one() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 2).await;
        let expired = seed_visit(&db, case.id, date(2015, 1, 1), "inpatient").await;
        let fresh = seed_visit(&db, case.id, months_ago(1), "inpatient").await;
        let s = scanner(&db);

        let missing = s.process_one(9999).await.unwrap_err();
        assert!(matches!(missing, RetentionError::VisitNotFound(9999)));

        assert!(matches!(
            s.process_one(fresh.id).await.unwrap(),
            Transition::NotExpired { .. }
        ));
        assert!(matches!(
            s.process_one(expired.id).await.unwrap(),
            Transition::Transferred { .. }
        ));
        // Now inactive: a no-op
        assert_eq!(
            s.process_one(expired.id).await.unwrap(),
            Transition::AlreadyInactive
        );
    }

    #[tokio::test]
    async fn test_process_one_inactive_without_record_is_noop() {
        let db = DbPool::in_memory();
        let case = seed_case(&db, 2, 2).await;
        let visit = seed_visit(&db, case.id, date(2015, 1, 1), "inpatient").await;
        db.visits()
            .update_visit_status(visit.id, VisitStatus::Inactive)
            .await
            .unwrap();

        assert_eq!(
            scanner(&db).process_one(visit.id).await.unwrap(),
            Transition::AlreadyInactive
        );
        assert!(db.transfer_records().get_by_visit_id(visit.id).await.unwrap().is_none());
    }
}
