pub mod byte_array;
pub mod customers;
pub mod menu_items;
pub mod orders;
pub mod pagination;
pub mod price_updates;
pub mod restaurants;
pub mod settlements;

use {
    byte_array::ByteArray,
    sqlx::{Executor, PgConnection, PgPool},
};

// Design:
//
// Table modules expose free functions taking `&mut PgConnection` (called
// `ex` for `Executor`) so callers decide whether a call runs standalone or
// as part of a bigger transaction. All inserts are keyed by ledger identity
// and use `ON CONFLICT DO NOTHING`, which makes every sync pass repeatable
// and makes concurrent duplicate inserts fail closed instead of erroring.
//
// For tests a useful pattern is to begin a transaction, run all queries on
// it and never commit. The rollback on drop lets postgres tests run in
// parallel without clearing tables first.

pub type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

pub type Address = ByteArray<20>;
pub type TransactionHash = ByteArray<32>;

/// The names of all tables owned by this schema, in foreign-key order.
pub const TABLES: &[&str] = &[
    "customers",
    "restaurants",
    "menu_items",
    "orders",
    "price_updates",
    "payments",
    "refunds",
];

/// Row count of a single table, for the statistics endpoint. The table
/// name must come from [`TABLES`].
pub async fn table_row_count(ex: &mut PgConnection, table: &str) -> sqlx::Result<i64> {
    assert!(TABLES.contains(&table), "unknown table {table}");
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table};"))
        .fetch_one(ex)
        .await?;
    Ok(count)
}

/// Delete all data in the database. Only used by tests.
#[allow(non_snake_case)]
pub async fn clear_DANGER_(ex: &mut PgTransaction<'_>) -> sqlx::Result<()> {
    for table in TABLES {
        ex.execute(format!("TRUNCATE {table} CASCADE;").as_str())
            .await?;
    }
    Ok(())
}

/// Like above but more ergonomic for tests that use a pool.
#[allow(non_snake_case)]
pub async fn clear_DANGER(pool: &PgPool) -> sqlx::Result<()> {
    let mut transaction = pool.begin().await?;
    clear_DANGER_(&mut transaction).await?;
    transaction.commit().await
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        sqlx::{Connection, PgConnection},
    };

    #[tokio::test]
    #[ignore]
    async fn postgres_clear() {
        let mut con = PgConnection::connect("postgresql://").await.unwrap();
        let mut con = con.begin().await.unwrap();
        clear_DANGER_(&mut con).await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_row_counts() {
        let mut con = PgConnection::connect("postgresql://").await.unwrap();
        let mut con = con.begin().await.unwrap();
        clear_DANGER_(&mut con).await.unwrap();
        for table in TABLES {
            assert_eq!(table_row_count(&mut con, table).await.unwrap(), 0);
        }
    }
}
