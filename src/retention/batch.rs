//! Paginated batch scan with a bounded worker pool.
//!
//! A producer walks the look-ahead query page by page and hands each page to
//! a pool of worker tasks through a bounded queue. Workers run the shared
//! transition for every visit on their page. Failures never stop other
//! visits: each page reports at most one coalesced error, and the run
//! returns all of them as a single aggregate once every worker has finished.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::{RetentionError, ScanReport, Transitioner, lookahead_cutoff};
use crate::{
    config::RetentionConfig,
    db::VisitRepo,
    models::Visit,
    observability::metrics,
};

/// Summary of a successful batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Visit count used to size the run
    pub total_visits: u64,
    pub pages: u64,
    #[serde(flatten)]
    pub visits: ScanReport,
}

struct PageJob {
    page: u64,
    visits: Vec<Visit>,
}

pub struct BatchExpirationProcessor {
    visits: Arc<dyn VisitRepo>,
    transitioner: Arc<Transitioner>,
    page_size: u64,
    worker_count: usize,
    lookahead_months: u32,
}

impl BatchExpirationProcessor {
    pub fn new(
        visits: Arc<dyn VisitRepo>,
        transitioner: Arc<Transitioner>,
        config: &RetentionConfig,
    ) -> Self {
        Self {
            visits,
            transitioner,
            page_size: config.page_size.max(1),
            worker_count: config.worker_count.max(1),
            lookahead_months: config.lookahead_months,
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<BatchReport, RetentionError> {
        let total = self.visits.get_visit_count().await?.max(0) as u64;
        if total == 0 {
            tracing::info!("No visits to check");
            return Ok(BatchReport::default());
        }

        // Fixed for the whole run so every page sees the same candidate set
        let cutoff = lookahead_cutoff(Utc::now().date_naive(), self.lookahead_months)
            .ok_or(RetentionError::LookaheadOutOfRange(self.lookahead_months))?;

        let pages = total.div_ceil(self.page_size);
        tracing::info!(
            total_visits = total,
            pages,
            page_size = self.page_size,
            workers = self.worker_count,
            lookahead_months = self.lookahead_months,
            cutoff = %cutoff,
            "Starting batch expiration check"
        );

        let (job_tx, job_rx) = mpsc::channel::<PageJob>(self.worker_count);
        let job_rx = Arc::new(Mutex::new(job_rx));
        // Every page sends at most one error, so sends never wait
        let (error_tx, mut error_rx) = mpsc::channel::<RetentionError>(pages as usize);

        let workers: Vec<_> = (0..self.worker_count)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&job_rx),
                    error_tx.clone(),
                    Arc::clone(&self.transitioner),
                    cancel.clone(),
                ))
            })
            .collect();
        drop(job_rx);

        let mut producer_cancelled = false;
        for page in 0..pages {
            if cancel.is_cancelled() {
                producer_cancelled = true;
                break;
            }

            let offset = page * self.page_size;
            let fetched = self
                .visits
                .get_potentially_expired_visits(cutoff, self.page_size as i64, offset as i64)
                .await;

            match fetched {
                Ok(visits) if visits.is_empty() => {
                    tracing::debug!(page, offset, "Empty page");
                }
                Ok(visits) => {
                    tokio::select! {
                        sent = job_tx.send(PageJob { page, visits }) => {
                            if sent.is_err() {
                                // All workers have exited
                                break;
                            }
                        }
                        _ = cancel.cancelled() => {
                            producer_cancelled = true;
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(page, offset, error = %e, "Failed to fetch page");
                    let _ = error_tx
                        .send(RetentionError::Page {
                            page,
                            errors: vec![e.into()],
                        })
                        .await;
                }
            }
        }
        drop(job_tx);
        drop(error_tx);

        let mut report = BatchReport {
            total_visits: total,
            pages,
            visits: ScanReport::default(),
        };
        let mut errors = Vec::new();
        for joined in futures::future::join_all(workers).await {
            match joined {
                Ok(worker_report) => report.visits.merge(&worker_report),
                Err(e) => errors.push(RetentionError::Worker(e.to_string())),
            }
        }

        while let Some(e) = error_rx.recv().await {
            errors.push(e);
        }
        if producer_cancelled {
            errors.push(RetentionError::Cancelled);
        }

        tracing::info!(
            scanned = report.visits.scanned,
            transferred = report.visits.transferred,
            already_transferred = report.visits.already_transferred,
            not_expired = report.visits.not_expired,
            failed = report.visits.failed,
            failed_pages = errors.len(),
            "Batch expiration check finished"
        );

        if errors.is_empty() {
            Ok(report)
        } else {
            Err(RetentionError::Batch { errors })
        }
    }
}

async fn run_worker(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<PageJob>>>,
    errors: mpsc::Sender<RetentionError>,
    transitioner: Arc<Transitioner>,
    cancel: CancellationToken,
) -> ScanReport {
    let mut report = ScanReport::default();

    loop {
        let job = jobs.lock().await.recv().await;
        let Some(PageJob { page, visits }) = job else {
            break;
        };

        let mut page_errors = Vec::new();
        let mut cancelled = false;
        for visit in &visits {
            if cancel.is_cancelled() {
                page_errors.push(RetentionError::Cancelled);
                cancelled = true;
                break;
            }

            report.scanned += 1;
            match transitioner.apply(visit, Utc::now()).await {
                Ok(transition) => report.record(&transition),
                Err(e) => {
                    report.failed += 1;
                    metrics::record_visit_failure(e.kind().as_str());
                    tracing::warn!(worker_id, page, visit_id = visit.id, error = %e, "Failed to process visit");
                    page_errors.push(RetentionError::visit(visit.id, e));
                }
            }
        }

        if !page_errors.is_empty() {
            let _ = errors
                .send(RetentionError::Page {
                    page,
                    errors: page_errors,
                })
                .await;
        }
        if cancelled {
            tracing::debug!(worker_id, page, "Worker stopping on cancellation");
            break;
        }
    }

    report
}
