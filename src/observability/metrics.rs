//! Prometheus metrics for purge runs and ingestion.
//!
//! Every recording function compiles to a no-op without the `prometheus`
//! feature, so callers never need their own `cfg` gates.

#[cfg(feature = "prometheus")]
use metrics::{counter, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime; the listener runs on it.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &[0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 3600.0],
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?
        .install()
        .map_err(MetricsError::Install)?;

    tracing::info!(listen = %config.listen, "Prometheus exporter listening");
    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(_config: &MetricsConfig) -> Result<(), MetricsError> {
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Purge Metrics
// ─────────────────────────────────────────────────────────────────────────────

/// Record rows removed from one activity table.
pub fn record_purge_deletion(table: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "autopurge_deletions_total",
            "table" => table.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (table, count);
    }
}

/// Record a table that could not be purged.
pub fn record_purge_table_error(table: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "autopurge_table_errors_total",
            "table" => table.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = table;
    }
}

/// Record the end of a purge run.
///
/// # Arguments
/// * `outcome` - "completed", "skipped", "store_busy", "consumer_busy" or "failed"
/// * `duration_secs` - Wall time from the end of the startup delay
pub fn record_purge_run(outcome: &str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "autopurge_runs_total",
            "outcome" => outcome.to_string()
        )
        .increment(1);
        histogram!(
            "autopurge_run_duration_seconds",
            "outcome" => outcome.to_string()
        )
        .record(duration_secs);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (outcome, duration_secs);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingest Metrics
// ─────────────────────────────────────────────────────────────────────────────

/// Record activity entries leaving the ingest buffer.
///
/// # Arguments
/// * `result` - "written", "failed" or "dropped"
pub fn record_ingest_entries(result: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "autopurge_ingest_entries_total",
            "result" => result.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (result, count);
    }
}

/// Metrics initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
