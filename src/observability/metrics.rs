//! Prometheus metrics for the retention engine.
//!
//! Every recording function compiles to a no-op without the `prometheus`
//! feature, so call sites never need their own `cfg` guards.

#[cfg(feature = "prometheus")]
use std::sync::OnceLock;

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::MetricsConfig;

#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a tokio runtime; the exporter serves
/// `/metrics` on `config.listen` from a background task.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let addr: std::net::SocketAddr = config
        .listen
        .parse()
        .map_err(|e| MetricsError::Setup(format!("Invalid listen address '{}': {e}", config.listen)))?;

    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &config.duration_buckets_secs,
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?;

    let handle = builder.install_recorder().map_err(MetricsError::Install)?;
    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| MetricsError::Setup("Metrics already initialized".to_string()))?;

    tracing::info!(listen = %addr, "Prometheus metrics enabled");
    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        tracing::warn!("Metrics enabled in config but the prometheus feature is not compiled in");
    }
    Ok(())
}

/// Get the Prometheus handle for rendering metrics.
#[cfg(feature = "prometheus")]
pub fn get_prometheus_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record a pending transfer record created by the engine.
pub fn record_transfer_created() {
    #[cfg(feature = "prometheus")]
    {
        counter!("retention_transfers_created_total").increment(1);
    }
}

/// Record a visit that failed during a scan.
///
/// # Arguments
/// * `kind` - Error category (e.g., "validation", "not_found", "store")
pub fn record_visit_failure(kind: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "retention_visit_failures_total",
            "kind" => kind.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = kind;
    }
}

/// Record a finished scan run and its duration.
///
/// # Arguments
/// * `path` - Trigger path, "full" or "batch"
/// * `duration_secs` - Wall-clock duration of the run
pub fn record_scan_run(path: &str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "retention_scan_runs_total",
            "path" => path.to_string()
        )
        .increment(1);
        histogram!(
            "retention_scan_duration_seconds",
            "path" => path.to_string()
        )
        .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (path, duration_secs);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
