use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{ActivityRecord, ActivityTable},
};

#[async_trait]
pub trait ActivityRepo: Send + Sync {
    /// Create every activity table (and its `time` index) under `prefix` if
    /// missing.
    async fn ensure_schema(&self, prefix: &str) -> DbResult<()>;

    /// Insert a batch of records in one transaction.
    /// Returns the number of rows written.
    async fn insert_batch(&self, prefix: &str, records: &[ActivityRecord]) -> DbResult<usize>;

    /// Rows currently stored in one table.
    async fn count(&self, prefix: &str, table: ActivityTable) -> DbResult<u64>;
}
