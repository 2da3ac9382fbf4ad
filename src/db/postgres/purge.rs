use std::time::Duration;

use async_trait::async_trait;
use sqlx::{ConnectOptions, PgConnection, PgPool, pool::PoolConnection};

use crate::db::{
    error::{DbError, DbResult},
    repos::{ConnectionProvider, PurgeConnection, checked_table_name},
};

/// Purge connections always come from the primary; replicas are read-only.
pub struct PostgresConnectionProvider {
    write_pool: PgPool,
}

impl PostgresConnectionProvider {
    pub fn new(write_pool: PgPool) -> Self {
        Self { write_pool }
    }
}

#[async_trait]
impl ConnectionProvider for PostgresConnectionProvider {
    async fn acquire(
        &self,
        exclusive: bool,
        timeout: Duration,
    ) -> DbResult<Box<dyn PurgeConnection>> {
        let conn = if exclusive {
            let options = self.write_pool.connect_options();
            let conn = tokio::time::timeout(timeout, options.connect())
                .await
                .map_err(|_| DbError::Timeout(timeout))??;
            PostgresPurgeConnection::Dedicated(conn)
        } else {
            let conn = tokio::time::timeout(timeout, self.write_pool.acquire())
                .await
                .map_err(|_| DbError::Timeout(timeout))??;
            PostgresPurgeConnection::Pooled(conn)
        };
        Ok(Box::new(conn))
    }
}

pub enum PostgresPurgeConnection {
    Pooled(PoolConnection<sqlx::Postgres>),
    Dedicated(PgConnection),
}

impl PostgresPurgeConnection {
    fn raw(&mut self) -> &mut PgConnection {
        match self {
            PostgresPurgeConnection::Pooled(conn) => &mut **conn,
            PostgresPurgeConnection::Dedicated(conn) => conn,
        }
    }
}

/// PostgreSQL reclaims space through autovacuum, so `compact` stays a no-op.
#[async_trait]
impl PurgeConnection for PostgresPurgeConnection {
    async fn count_before(&mut self, table: &str, cutoff: i64) -> DbResult<u64> {
        let table = checked_table_name(table)?;
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE time < $1"
        ))
        .bind(cutoff)
        .fetch_one(self.raw())
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn delete_before(&mut self, table: &str, cutoff: i64, batch_size: u32) -> DbResult<u64> {
        let table = checked_table_name(table)?;

        if batch_size == 0 {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE time < $1"))
                .bind(cutoff)
                .execute(self.raw())
                .await?;
            return Ok(result.rows_affected());
        }

        let sql = format!(
            "DELETE FROM {table} WHERE ctid IN \
             (SELECT ctid FROM {table} WHERE time < $1 LIMIT $2)"
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
}
