use std::time::Duration;

use async_trait::async_trait;
use sqlx::{ConnectOptions, SqliteConnection, SqlitePool, pool::PoolConnection};

use crate::db::{
    error::{DbError, DbResult},
    repos::{ConnectionProvider, PurgeConnection, checked_table_name},
};

pub struct SqliteConnectionProvider {
    pool: SqlitePool,
}

impl SqliteConnectionProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionProvider for SqliteConnectionProvider {
    async fn acquire(
        &self,
        exclusive: bool,
        timeout: Duration,
    ) -> DbResult<Box<dyn PurgeConnection>> {
        let conn = if exclusive {
            // A dedicated connection built from the pool's options, so the pool
            // keeps serving ingestion while the purge holds this one.
            let options = self.pool.connect_options();
            let conn = tokio::time::timeout(timeout, options.connect())
                .await
                .map_err(|_| DbError::Timeout(timeout))??;
            SqlitePurgeConnection::Dedicated(conn)
        } else {
            let conn = tokio::time::timeout(timeout, self.pool.acquire())
                .await
                .map_err(|_| DbError::Timeout(timeout))??;
            SqlitePurgeConnection::Pooled(conn)
        };
        Ok(Box::new(conn))
    }
}

pub enum SqlitePurgeConnection {
    Pooled(PoolConnection<sqlx::Sqlite>),
    Dedicated(SqliteConnection),
}

impl SqlitePurgeConnection {
    fn raw(&mut self) -> &mut SqliteConnection {
        match self {
            SqlitePurgeConnection::Pooled(conn) => &mut **conn,
            SqlitePurgeConnection::Dedicated(conn) => conn,
        }
    }
}

#[async_trait]
impl PurgeConnection for SqlitePurgeConnection {
    async fn count_before(&mut self, table: &str, cutoff: i64) -> DbResult<u64> {
        let table = checked_table_name(table)?;
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE time < ?"
        ))
        .bind(cutoff)
        .fetch_one(self.raw())
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn delete_before(&mut self, table: &str, cutoff: i64, batch_size: u32) -> DbResult<u64> {
        let table = checked_table_name(table)?;

        if batch_size == 0 {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE time < ?"))
                .bind(cutoff)
                .execute(self.raw())
                .await?;
            return Ok(result.rows_affected());
        }

        // SQLite builds usually lack DELETE ... LIMIT, so select each chunk by rowid.
        let sql = format!(
            "DELETE FROM {table} WHERE rowid IN \
             (SELECT rowid FROM {table} WHERE time < ? LIMIT ?)"
        );
        let mut total_deleted: u64 = 0;
        loop {
            let deleted = sqlx::query(&sql)
                .bind(cutoff)
                .bind(i64::from(batch_size))
                .execute(self.raw())
                .await
                .map_err(|e| DbError::from(e).after_removing(total_deleted))?
                .rows_affected();

            total_deleted += deleted;

            if deleted < u64::from(batch_size) {
                break;
            }

            tokio::task::yield_now().await;
        }

        Ok(total_deleted)
    }

    async fn compact(&mut self) -> DbResult<()> {
        sqlx::query("VACUUM").execute(self.raw()).await?;
        Ok(())
    }
}
