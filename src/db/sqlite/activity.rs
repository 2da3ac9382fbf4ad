use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::{
    db::{
        error::DbResult,
        repos::{ActivityRepo, checked_table_name},
    },
    models::{ActivityRecord, ActivityTable},
};

pub struct SqliteActivityRepo {
    pool: SqlitePool,
}

impl SqliteActivityRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepo for SqliteActivityRepo {
    async fn ensure_schema(&self, prefix: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        for table in ActivityTable::ALL {
            let name = table.qualified_name(prefix);
            let name = checked_table_name(&name)?;
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {name} (\
                 id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 time INTEGER NOT NULL, \
                 actor TEXT NOT NULL, \
                 detail TEXT)"
            ))
            .execute(&mut *tx)
            .await?;
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {name}_time_idx ON {name} (time)"
            ))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_batch(&self, prefix: &str, records: &[ActivityRecord]) -> DbResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;
        for record in records {
            let name = record.table.qualified_name(prefix);
            let name = checked_table_name(&name)?;
            let result = sqlx::query(&format!(
                "INSERT INTO {name} (time, actor, detail) VALUES (?, ?, ?)"
            ))
            .bind(record.time)
            .bind(&record.actor)
            .bind(record.detail.as_deref())
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await?;

        Ok(inserted)
    }

    async fn count(&self, prefix: &str, table: ActivityTable) -> DbResult<u64> {
        let name = table.qualified_name(prefix);
        let name = checked_table_name(&name)?;
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {name}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
