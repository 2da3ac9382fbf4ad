//! Destinations the ingest buffer flushes activity rows to.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{db::ActivityRepo, models::ActivityRecord, observability::metrics};

/// Where flushed activity rows go.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    /// Write a batch of records.
    ///
    /// Returns the number of records successfully written.
    async fn write_batch(&self, records: &[ActivityRecord]) -> Result<usize, ActivitySinkError>;

    /// Get the sink name for logging/metrics.
    fn name(&self) -> &'static str;
}

/// Errors from activity sinks.
#[derive(Debug, thiserror::Error)]
pub enum ActivitySinkError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Writes activity rows into the prefixed activity tables.
pub struct DatabaseSink {
    repo: Arc<dyn ActivityRepo>,
    table_prefix: String,
}

impl DatabaseSink {
    pub fn new(repo: Arc<dyn ActivityRepo>, table_prefix: impl Into<String>) -> Self {
        Self {
            repo,
            table_prefix: table_prefix.into(),
        }
    }
}

#[async_trait]
impl ActivitySink for DatabaseSink {
    async fn write_batch(&self, records: &[ActivityRecord]) -> Result<usize, ActivitySinkError> {
        if records.is_empty() {
            return Ok(0);
        }

        let start = std::time::Instant::now();
        match self.repo.insert_batch(&self.table_prefix, records).await {
            Ok(inserted) => {
                metrics::record_ingest_entries("written", inserted as u64);
                tracing::debug!(
                    inserted,
                    total = records.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Activity batch insert successful"
                );
                Ok(inserted)
            }
            Err(e) => {
                metrics::record_ingest_entries("failed", records.len() as u64);
                tracing::error!(
                    error = %e,
                    count = records.len(),
                    "Failed to batch insert activity rows"
                );
                Err(ActivitySinkError::Database(e.to_string()))
            }
        }
    }

    fn name(&self) -> &'static str {
        "database"
    }
}
