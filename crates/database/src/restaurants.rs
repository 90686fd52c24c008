//! Restaurants mirrored from the event index, keyed by wallet address.

use {
    crate::{Address, pagination::Page},
    sqlx::{
        PgConnection,
        types::chrono::{DateTime, Utc},
    },
};

/// One row in the `restaurants` table.
#[derive(Clone, Debug, Eq, PartialEq, sqlx::FromRow)]
pub struct Restaurant {
    pub wallet: Address,
    pub store_address: String,
    /// Default slippage tolerance the restaurant accepts, in basis points.
    pub default_slippage_bps: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn insert(ex: &mut PgConnection, restaurant: &Restaurant) -> sqlx::Result<bool> {
    const QUERY: &str = r#"
INSERT INTO restaurants (wallet, store_address, default_slippage_bps, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (wallet) DO NOTHING
    "#;
    let result = sqlx::query(QUERY)
        .bind(restaurant.wallet)
        .bind(&restaurant.store_address)
        .bind(restaurant.default_slippage_bps)
        .bind(restaurant.created_at)
        .bind(restaurant.updated_at)
        .execute(ex)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn exists(ex: &mut PgConnection, wallet: &Address) -> sqlx::Result<bool> {
    const QUERY: &str = "SELECT EXISTS (SELECT 1 FROM restaurants WHERE wallet = $1)";
    let (exists,): (bool,) = sqlx::query_as(QUERY).bind(wallet).fetch_one(ex).await?;
    Ok(exists)
}

pub async fn list(ex: &mut PgConnection, page: &Page) -> sqlx::Result<Vec<Restaurant>> {
    const QUERY: &str = r#"
SELECT * FROM restaurants
ORDER BY created_at DESC, wallet
LIMIT $1 OFFSET $2
    "#;
    sqlx::query_as(QUERY)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(ex)
        .await
}

pub async fn count(ex: &mut PgConnection) -> sqlx::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM restaurants")
        .fetch_one(ex)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use {super::*, crate::byte_array::ByteArray, sqlx::Connection};

    #[tokio::test]
    #[ignore]
    async fn postgres_insert_and_list() {
        let mut db = PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let row = Restaurant {
            wallet: ByteArray([3; 20]),
            store_address: "1 Bakery Lane".to_string(),
            default_slippage_bps: 200,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(insert(&mut db, &row).await.unwrap());
        assert!(!insert(&mut db, &row).await.unwrap());

        let listed = list(&mut db, &Page::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].default_slippage_bps, 200);
        assert_eq!(count(&mut db).await.unwrap(), 1);
    }
}
