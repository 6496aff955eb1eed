//! Retention-expiration engine.
//!
//! Decides, per visit, whether the inactive period configured on the visit's
//! case type has elapsed, and if so materializes a pending media transfer
//! record and marks the visit inactive. Two trigger paths share the same
//! per-visit transition:
//!
//! 1. [`ExpirationScanner::run_full_scan`] walks every active visit in one pass
//! 2. [`BatchExpirationProcessor::run`] pages through look-ahead candidates
//!    with a bounded pool of worker tasks
//!
//! Both are idempotent: re-running either never duplicates a transfer record.
//! `dry_run` evaluates and logs without writing.

mod batch;
mod error;
mod policy;
mod scanner;
mod transition;

use std::{sync::Arc, time::Instant};

pub use batch::{BatchExpirationProcessor, BatchReport};
pub use error::{ErrorKind, RetentionError};
pub use policy::{Decision, add_years, evaluate, lookahead_cutoff};
pub use scanner::{ExpirationScanner, ScanReport};
pub use transition::{Transition, Transitioner};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    config::RetentionConfig,
    db::{CaseTypeRepo, DbPool, StageRecordRepo, VisitRepo},
    observability::metrics,
};

/// Entry points of the retention engine.
pub struct RetentionEngine {
    scanner: ExpirationScanner,
    batch: BatchExpirationProcessor,
    config: RetentionConfig,
}

impl RetentionEngine {
    pub fn new(db: &DbPool, config: RetentionConfig) -> Self {
        Self::from_repos(db.visits(), db.case_types(), db.transfer_records(), config)
    }

    pub fn from_repos(
        visits: Arc<dyn VisitRepo>,
        case_types: Arc<dyn CaseTypeRepo>,
        transfers: Arc<dyn StageRecordRepo>,
        config: RetentionConfig,
    ) -> Self {
        let transitioner = Arc::new(Transitioner::new(
            Arc::clone(&visits),
            case_types,
            transfers,
            config.dry_run,
        ));
        Self {
            scanner: ExpirationScanner::new(Arc::clone(&visits), Arc::clone(&transitioner)),
            batch: BatchExpirationProcessor::new(visits, transitioner, &config),
            config,
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Evaluate every active visit in one pass.
    pub async fn run_full_scan(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, RetentionError> {
        let span = tracing::info_span!("retention_scan", path = "full", run_id = %Uuid::new_v4());
        async {
            let started = Instant::now();
            tracing::info!(dry_run = self.config.dry_run, "Starting full expiration scan");

            let result = self.scanner.run_full_scan(cancel).await;
            metrics::record_scan_run("full", started.elapsed().as_secs_f64());

            match &result {
                Ok(report) => tracing::info!(
                    scanned = report.scanned,
                    transferred = report.transferred,
                    already_transferred = report.already_transferred,
                    not_expired = report.not_expired,
                    would_transfer = report.would_transfer,
                    failed = report.failed,
                    "Full expiration scan complete"
                ),
                Err(e) => tracing::error!(error = %e, "Full expiration scan failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Page through look-ahead candidates with the worker pool.
    pub async fn run_batch_scan(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, RetentionError> {
        let span = tracing::info_span!("retention_scan", path = "batch", run_id = %Uuid::new_v4());
        async {
            let started = Instant::now();
            let result = self.batch.run(cancel).await;
            metrics::record_scan_run("batch", started.elapsed().as_secs_f64());

            if let Err(e) = &result {
                tracing::error!(
                    failures = e.leaf_count(),
                    cancelled = e.is_cancelled(),
                    error = %e,
                    "Batch expiration check finished with errors"
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Evaluate a single visit, transferring it if expired.
    pub async fn process_one(&self, visit_id: i64) -> Result<Transition, RetentionError> {
        let transition = self.scanner.process_one(visit_id).await?;
        tracing::debug!(visit_id, ?transition, "Processed visit");
        Ok(transition)
    }
}
