use std::time::Duration;

use async_trait::async_trait;

use crate::db::error::{DbError, DbResult};

/// Hands out connections for a purge run.
///
/// A purge holds one connection for its whole run. `exclusive` asks for a
/// connection outside the shared pool so that compaction can run without
/// other pool members holding the file open.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Acquire a connection, giving up after `timeout`.
    async fn acquire(
        &self,
        exclusive: bool,
        timeout: Duration,
    ) -> DbResult<Box<dyn PurgeConnection>>;
}

/// The statements a purge run issues against one activity table.
///
/// Table names passed in are already prefixed and must pass
/// [`checked_table_name`]; implementations interpolate them into SQL.
#[async_trait]
pub trait PurgeConnection: Send {
    /// Number of rows with `time < cutoff`.
    async fn count_before(&mut self, table: &str, cutoff: i64) -> DbResult<u64>;

    /// Delete rows with `time < cutoff` and return how many were removed.
    ///
    /// With a non-zero `batch_size` rows are removed in chunks of at most that
    /// many, each its own statement. Batches that committed before a failure
    /// stay removed; the error then reports them through
    /// [`DbError::rows_removed`].
    async fn delete_before(&mut self, table: &str, cutoff: i64, batch_size: u32) -> DbResult<u64>;

    /// Reclaim space after a large delete. Engines without a file to shrink
    /// keep the default no-op.
    async fn compact(&mut self) -> DbResult<()> {
        Ok(())
    }
}

/// Reject table names that are not plain identifiers.
pub fn checked_table_name(name: &str) -> DbResult<&str> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(DbError::Validation(format!("invalid table name: {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_table_name() {
        assert!(checked_table_name("co_block").is_ok());
        assert!(checked_table_name("block").is_ok());
        assert!(checked_table_name("_x1").is_ok());

        assert!(checked_table_name("").is_err());
        assert!(checked_table_name("1block").is_err());
        assert!(checked_table_name("co_block; DROP TABLE x").is_err());
        assert!(checked_table_name("co-block").is_err());
        assert!(checked_table_name("\"co_block\"").is_err());
    }
}
