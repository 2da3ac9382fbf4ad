//! Shared tests for ActivityRepo implementations

use crate::{
    db::{repos::ActivityRepo, tests::harness::TEST_PREFIX},
    models::{ActivityRecord, ActivityTable},
};

fn record(table: ActivityTable, time: i64) -> ActivityRecord {
    ActivityRecord {
        table,
        time,
        actor: "steve".to_string(),
        detail: None,
    }
}

async fn test_schema_starts_empty(repo: &dyn ActivityRepo) {
    for table in ActivityTable::ALL {
        assert_eq!(repo.count(TEST_PREFIX, table).await.unwrap(), 0);
    }
}

async fn test_ensure_schema_is_idempotent(repo: &dyn ActivityRepo) {
    repo.insert_batch(TEST_PREFIX, &[record(ActivityTable::Chat, 1)])
        .await
        .unwrap();
    repo.ensure_schema(TEST_PREFIX).await.unwrap();

    assert_eq!(repo.count(TEST_PREFIX, ActivityTable::Chat).await.unwrap(), 1);
}

async fn test_insert_batch_routes_to_tables(repo: &dyn ActivityRepo) {
    let written = repo
        .insert_batch(
            TEST_PREFIX,
            &[
                record(ActivityTable::Chat, 1),
                record(ActivityTable::Chat, 2),
                ActivityRecord {
                    detail: Some("minecraft:stone".to_string()),
                    ..record(ActivityTable::Block, 3)
                },
            ],
        )
        .await
        .unwrap();

    assert_eq!(written, 3);
    assert_eq!(repo.count(TEST_PREFIX, ActivityTable::Chat).await.unwrap(), 2);
    assert_eq!(repo.count(TEST_PREFIX, ActivityTable::Block).await.unwrap(), 1);
    assert_eq!(repo.count(TEST_PREFIX, ActivityTable::Sign).await.unwrap(), 0);
}

async fn test_insert_empty_batch(repo: &dyn ActivityRepo) {
    assert_eq!(repo.insert_batch(TEST_PREFIX, &[]).await.unwrap(), 0);
}

async fn test_invalid_prefix_is_rejected(repo: &dyn ActivityRepo) {
    assert!(repo.ensure_schema("co-").await.is_err());
    assert!(
        repo.insert_batch("x;", &[record(ActivityTable::Chat, 1)])
            .await
            .is_err()
    );
}

// ============================================================================
// SQLite Tests - Fast, in-memory
// ============================================================================

#[cfg(all(test, feature = "database-sqlite"))]
mod sqlite_tests {
    use crate::db::{
        repos::ActivityRepo,
        sqlite::SqliteActivityRepo,
        tests::harness::{TEST_PREFIX, create_sqlite_pool},
    };

    async fn create_repo() -> SqliteActivityRepo {
        let repo = SqliteActivityRepo::new(create_sqlite_pool().await);
        repo.ensure_schema(TEST_PREFIX)
            .await
            .expect("Failed to create activity schema");
        repo
    }

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let repo = create_repo().await;
                super::$name(&repo).await;
            }
        };
    }

    sqlite_test!(test_schema_starts_empty);
    sqlite_test!(test_ensure_schema_is_idempotent);
    sqlite_test!(test_insert_batch_routes_to_tables);
    sqlite_test!(test_insert_empty_batch);
    sqlite_test!(test_invalid_prefix_is_rejected);
}

// ============================================================================
// PostgreSQL Tests - Require Docker, run with `cargo test -- --ignored`
// ============================================================================

#[cfg(all(test, feature = "database-postgres"))]
mod postgres_tests {
    use crate::db::{
        postgres::PostgresActivityRepo,
        repos::ActivityRepo,
        tests::harness::{TEST_PREFIX, postgres::create_isolated_postgres_pool},
    };

    macro_rules! postgres_test {
        ($name:ident) => {
            #[tokio::test]
            #[ignore = "Requires Docker - run with `cargo test -- --ignored`"]
            async fn $name() {
                let pool = create_isolated_postgres_pool().await;
                let repo = PostgresActivityRepo::new(pool, None);
                repo.ensure_schema(TEST_PREFIX)
                    .await
                    .expect("Failed to create activity schema");
                super::$name(&repo).await;
            }
        };
    }

    postgres_test!(test_schema_starts_empty);
    postgres_test!(test_ensure_schema_is_idempotent);
    postgres_test!(test_insert_batch_routes_to_tables);
    postgres_test!(test_insert_empty_batch);
    postgres_test!(test_invalid_prefix_is_rejected);
}
