//! Daily retention schedule.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::{config::SchedulerConfig, retention::RetentionEngine};

/// First occurrence of `time_of_day` (UTC) strictly after `now`.
pub fn first_run_after(now: DateTime<Utc>, time_of_day: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(time_of_day).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Next run after the one scheduled at `previous`, skipping any slots that
/// already passed while that run was executing.
pub fn advance_run(
    previous: DateTime<Utc>,
    now: DateTime<Utc>,
    interval_days: u32,
) -> DateTime<Utc> {
    let step = Duration::days(i64::from(interval_days.max(1)));
    let mut next = previous + step;
    while next <= now {
        next += step;
    }
    next
}

/// Starts the retention schedule as a background task.
///
/// Runs until `cancel` fires. A failed run is logged and the schedule
/// continues with the next slot.
pub async fn start_retention_schedule(
    engine: Arc<RetentionEngine>,
    config: SchedulerConfig,
    cancel: CancellationToken,
) {
    if !config.enabled {
        tracing::info!("Retention schedule disabled by configuration");
        return;
    }

    let time_of_day = match config.time_of_day() {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "Retention schedule not started");
            return;
        }
    };

    let dry_run_msg = if engine.config().dry_run {
        " (DRY RUN)"
    } else {
        ""
    };

    tracing::info!(
        daily_at = %time_of_day,
        interval_days = config.interval_days,
        run_on_startup = config.run_on_startup,
        worker_count = engine.config().worker_count,
        page_size = engine.config().page_size,
        "Starting retention schedule{}",
        dry_run_msg
    );

    if config.run_on_startup {
        tracing::info!("Running initial retention check");
        run_scheduled(&engine, &cancel).await;
    }

    let heartbeat = config.heartbeat();
    let mut next = first_run_after(Utc::now(), time_of_day);

    loop {
        tracing::info!(next_run = %next, "Next retention run scheduled");

        loop {
            let now = Utc::now();
            if now >= next {
                break;
            }
            let wait = (next - now).to_std().unwrap_or_default().min(heartbeat);

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Retention schedule stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            if Utc::now() < next {
                tracing::info!(next_run = %next, "Retention schedule waiting");
            }
        }

        run_scheduled(&engine, &cancel).await;
        next = advance_run(next, Utc::now(), config.interval_days);
    }
}

async fn run_scheduled(engine: &RetentionEngine, cancel: &CancellationToken) {
    match engine.run_batch_scan(cancel).await {
        Ok(report) => {
            if report.visits.transferred > 0 || report.visits.would_transfer > 0 {
                tracing::info!(
                    transferred = report.visits.transferred,
                    would_transfer = report.visits.would_transfer,
                    scanned = report.visits.scanned,
                    "Scheduled retention run complete"
                );
            } else {
                tracing::debug!("Scheduled retention run complete, no visits expired");
            }
        }
        // Details are logged by the engine
        Err(e) => tracing::warn!(failures = e.leaf_count(), "Scheduled retention run had errors"),
    }
}
