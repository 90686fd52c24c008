//! Append-only price update audit trail mirrored from on-chain events.
//! Uniqueness is (item name, transaction hash), so every on-chain event is
//! ingested at most once. This is the only table the maintenance task
//! deletes from, once rows age out of the retention window.

use {
    crate::{TransactionHash, pagination::Page},
    bigdecimal::BigDecimal,
    sqlx::{
        PgConnection, PgPool,
        types::chrono::{DateTime, Utc},
    },
    tracing::instrument,
};

/// One row in the `price_updates` table.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct PriceUpdate {
    pub item_name: String,
    pub old_price_usd: BigDecimal,
    pub new_price_usd: BigDecimal,
    pub block_number: i64,
    pub tx_hash: TransactionHash,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(ex: &mut PgConnection, update: &PriceUpdate) -> sqlx::Result<bool> {
    const QUERY: &str = r#"
INSERT INTO price_updates (item_name, old_price_usd, new_price_usd, block_number, tx_hash, created_at)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (item_name, tx_hash) DO NOTHING
    "#;
    let result = sqlx::query(QUERY)
        .bind(&update.item_name)
        .bind(&update.old_price_usd)
        .bind(&update.new_price_usd)
        .bind(update.block_number)
        .bind(update.tx_hash)
        .bind(update.created_at)
        .execute(ex)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub item: Option<String>,
}

pub async fn list(
    ex: &mut PgConnection,
    filter: &Filter,
    page: &Page,
) -> sqlx::Result<Vec<PriceUpdate>> {
    const QUERY: &str = r#"
SELECT * FROM price_updates
WHERE $1::text IS NULL OR item_name = $1
ORDER BY block_number DESC, tx_hash
LIMIT $2 OFFSET $3
    "#;
    sqlx::query_as(QUERY)
        .bind(&filter.item)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(ex)
        .await
}

pub async fn count(ex: &mut PgConnection, filter: &Filter) -> sqlx::Result<i64> {
    const QUERY: &str = r#"
SELECT COUNT(*) FROM price_updates
WHERE $1::text IS NULL OR item_name = $1
    "#;
    let (count,): (i64,) = sqlx::query_as(QUERY).bind(&filter.item).fetch_one(ex).await?;
    Ok(count)
}

/// Deletes rows first seen before the provided timestamp. Returns the
/// number of deleted rows.
#[instrument(skip_all)]
pub async fn delete_before(pool: &PgPool, timestamp: DateTime<Utc>) -> sqlx::Result<u64> {
    const QUERY: &str = r#"
DELETE FROM price_updates
WHERE created_at < $1
    "#;
    sqlx::query(QUERY)
        .bind(timestamp)
        .execute(pool)
        .await
        .map(|result| result.rows_affected())
}

#[cfg(test)]
mod tests {
    use {super::*, crate::byte_array::ByteArray, sqlx::Connection, std::str::FromStr};

    fn update(item: &str, tx: u8, created_at: DateTime<Utc>) -> PriceUpdate {
        PriceUpdate {
            item_name: item.to_string(),
            old_price_usd: BigDecimal::from_str("10").unwrap(),
            new_price_usd: BigDecimal::from_str("11.5").unwrap(),
            block_number: 50,
            tx_hash: ByteArray([tx; 32]),
            created_at,
        }
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_at_most_once_per_event() {
        let mut db = PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let row = update("ramen", 1, Utc::now());
        assert!(insert(&mut db, &row).await.unwrap());
        assert!(!insert(&mut db, &row).await.unwrap());

        // Same item, different transaction is a new event.
        assert!(insert(&mut db, &update("ramen", 2, Utc::now())).await.unwrap());

        let filter = Filter {
            item: Some("ramen".to_string()),
        };
        assert_eq!(count(&mut db, &filter).await.unwrap(), 2);
        assert_eq!(
            count(
                &mut db,
                &Filter {
                    item: Some("gyoza".to_string())
                }
            )
            .await
            .unwrap(),
            0
        );
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_retention_cleanup() {
        let pool = PgPool::connect("postgresql://").await.unwrap();
        crate::clear_DANGER(&pool).await.unwrap();

        let now = Utc::now();
        let mut ex = pool.acquire().await.unwrap();
        insert(&mut ex, &update("old", 1, now - chrono::Duration::days(91)))
            .await
            .unwrap();
        insert(&mut ex, &update("fresh", 2, now - chrono::Duration::days(1)))
            .await
            .unwrap();

        let deleted = delete_before(&pool, now - chrono::Duration::days(90))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let remaining = list(&mut ex, &Filter::default(), &Page::default())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].item_name, "fresh");
    }
}
