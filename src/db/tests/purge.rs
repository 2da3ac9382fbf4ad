//! Shared tests for ConnectionProvider / PurgeConnection implementations

use std::time::Duration;

use crate::{
    db::{
        error::DbError,
        repos::{ActivityRepo, ConnectionProvider, PurgeConnection},
        tests::harness::TEST_PREFIX,
    },
    models::{ActivityRecord, ActivityTable},
};

/// Test context: a provider to purge through and a repo to seed rows with.
pub struct PurgeTestContext<'a> {
    pub provider: &'a dyn ConnectionProvider,
    pub repo: &'a dyn ActivityRepo,
}

impl PurgeTestContext<'_> {
    async fn seed(&self, table: ActivityTable, times: impl IntoIterator<Item = i64>) {
        let records: Vec<_> = times
            .into_iter()
            .map(|time| ActivityRecord {
                table,
                time,
                actor: "alex".to_string(),
                detail: None,
            })
            .collect();
        self.repo
            .insert_batch(TEST_PREFIX, &records)
            .await
            .expect("Failed to seed rows");
    }

    async fn connection(&self) -> Box<dyn PurgeConnection> {
        self.provider
            .acquire(false, Duration::from_secs(5))
            .await
            .expect("Failed to acquire purge connection")
    }
}

fn chat() -> String {
    ActivityTable::Chat.qualified_name(TEST_PREFIX)
}

async fn test_count_is_strictly_before_cutoff(ctx: &PurgeTestContext<'_>) {
    ctx.seed(ActivityTable::Chat, [10, 20, 30, 40, 50]).await;
    let mut conn = ctx.connection().await;

    assert_eq!(conn.count_before(&chat(), 35).await.unwrap(), 3);
    assert_eq!(conn.count_before(&chat(), 30).await.unwrap(), 2);
    assert_eq!(conn.count_before(&chat(), 0).await.unwrap(), 0);
}

async fn test_single_statement_delete(ctx: &PurgeTestContext<'_>) {
    ctx.seed(ActivityTable::Chat, [10, 20, 30, 40, 50]).await;
    let mut conn = ctx.connection().await;

    assert_eq!(conn.delete_before(&chat(), 35, 0).await.unwrap(), 3);
    assert_eq!(conn.count_before(&chat(), i64::MAX).await.unwrap(), 2);
}

async fn test_batched_delete_removes_everything_eligible(ctx: &PurgeTestContext<'_>) {
    ctx.seed(ActivityTable::Chat, 0..25).await;
    let mut conn = ctx.connection().await;

    // 20 eligible rows in batches of 7: 7 + 7 + 6
    assert_eq!(conn.delete_before(&chat(), 20, 7).await.unwrap(), 20);
    assert_eq!(conn.count_before(&chat(), i64::MAX).await.unwrap(), 5);
}

async fn test_batched_delete_exact_multiple(ctx: &PurgeTestContext<'_>) {
    ctx.seed(ActivityTable::Chat, 0..10).await;
    let mut conn = ctx.connection().await;

    assert_eq!(conn.delete_before(&chat(), 100, 5).await.unwrap(), 10);
    assert_eq!(conn.count_before(&chat(), i64::MAX).await.unwrap(), 0);
}

async fn test_delete_leaves_other_tables_alone(ctx: &PurgeTestContext<'_>) {
    ctx.seed(ActivityTable::Chat, [1, 2, 3]).await;
    ctx.seed(ActivityTable::Block, [1, 2, 3]).await;
    let mut conn = ctx.connection().await;

    conn.delete_before(&chat(), 100, 0).await.unwrap();
    drop(conn);

    assert_eq!(ctx.repo.count(TEST_PREFIX, ActivityTable::Chat).await.unwrap(), 0);
    assert_eq!(ctx.repo.count(TEST_PREFIX, ActivityTable::Block).await.unwrap(), 3);
}

async fn test_invalid_table_name_is_rejected(ctx: &PurgeTestContext<'_>) {
    let mut conn = ctx.connection().await;

    let err = conn
        .count_before("co_chat; DROP TABLE co_chat", 0)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Validation(_)));
}

async fn test_missing_table_is_an_error(ctx: &PurgeTestContext<'_>) {
    let mut conn = ctx.connection().await;

    let err = conn.delete_before("co_missing", 0, 0).await.unwrap_err();
    assert!(matches!(err, DbError::Sqlx(_)));
}

// ============================================================================
// SQLite Tests - Fast, in-memory
// ============================================================================

#[cfg(all(test, feature = "database-sqlite"))]
mod sqlite_tests {
    use super::*;
    use crate::db::{
        sqlite::{SqliteActivityRepo, SqliteConnectionProvider},
        tests::harness::create_sqlite_pool,
    };

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let pool = create_sqlite_pool().await;
                let repo = SqliteActivityRepo::new(pool.clone());
                repo.ensure_schema(TEST_PREFIX)
                    .await
                    .expect("Failed to create activity schema");
                let provider = SqliteConnectionProvider::new(pool);
                let ctx = PurgeTestContext {
                    provider: &provider,
                    repo: &repo,
                };
                super::$name(&ctx).await;
            }
        };
    }

    sqlite_test!(test_count_is_strictly_before_cutoff);
    sqlite_test!(test_single_statement_delete);
    sqlite_test!(test_batched_delete_removes_everything_eligible);
    sqlite_test!(test_batched_delete_exact_multiple);
    sqlite_test!(test_delete_leaves_other_tables_alone);
    sqlite_test!(test_invalid_table_name_is_rejected);
    sqlite_test!(test_missing_table_is_an_error);
}

// ============================================================================
// PostgreSQL Tests - Require Docker, run with `cargo test -- --ignored`
// ============================================================================

#[cfg(all(test, feature = "database-postgres"))]
mod postgres_tests {
    use super::*;
    use crate::db::{
        postgres::{PostgresActivityRepo, PostgresConnectionProvider},
        tests::harness::postgres::create_isolated_postgres_pool,
    };

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let pool = create_isolated_postgres_pool().await;
                let repo = PostgresActivityRepo::new(pool.clone(), None);
                repo.ensure_schema(TEST_PREFIX)
                    .await
                    .expect("Failed to create activity schema");
                let provider = PostgresConnectionProvider::new(pool);
                let ctx = PurgeTestContext {
                    provider: &provider,
                    repo: &repo,
                };
                super::$name(&ctx).await;
            }
        };
    }

    postgres_test!(test_count_is_strictly_before_cutoff);
    postgres_test!(test_single_statement_delete);
    postgres_test!(test_batched_delete_removes_everything_eligible);
    postgres_test!(test_batched_delete_exact_multiple);
    postgres_test!(test_delete_leaves_other_tables_alone);
    postgres_test!(test_invalid_table_name_is_rejected);
    postgres_test!(test_missing_table_is_an_error);
}
