//! Menu items, unique per (restaurant, name). The quoted price is kept in
//! its raw fixed-point form together with the decimal exponent that was in
//! effect when the quote was indexed, so descaling never drifts.

use {
    crate::{Address, pagination::Page},
    bigdecimal::BigDecimal,
    sqlx::{
        PgConnection,
        types::chrono::{DateTime, Utc},
    },
};

/// One row in the `menu_items` table.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct MenuItem {
    pub restaurant: Address,
    pub name: String,
    /// Raw fixed-point price integer as indexed from the ledger.
    pub price: BigDecimal,
    /// Decimal exponent captured together with the raw price.
    pub price_decimals: i32,
    /// Payment tokens the restaurant accepts for this item.
    pub accepted_tokens: Vec<Address>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(ex: &mut PgConnection, item: &MenuItem) -> sqlx::Result<bool> {
    const QUERY: &str = r#"
INSERT INTO menu_items (restaurant, name, price, price_decimals, accepted_tokens, created_at)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (restaurant, name) DO NOTHING
    "#;
    let result = sqlx::query(QUERY)
        .bind(item.restaurant)
        .bind(&item.name)
        .bind(&item.price)
        .bind(item.price_decimals)
        .bind(&item.accepted_tokens)
        .bind(item.created_at)
        .execute(ex)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub restaurant: Option<Address>,
}

pub async fn list(ex: &mut PgConnection, filter: &Filter, page: &Page) -> sqlx::Result<Vec<MenuItem>> {
    const QUERY: &str = r#"
SELECT * FROM menu_items
WHERE $1::bytea IS NULL OR restaurant = $1
ORDER BY created_at DESC, restaurant, name
LIMIT $2 OFFSET $3
    "#;
    sqlx::query_as(QUERY)
        .bind(filter.restaurant)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(ex)
        .await
}

pub async fn count(ex: &mut PgConnection, filter: &Filter) -> sqlx::Result<i64> {
    const QUERY: &str = r#"
SELECT COUNT(*) FROM menu_items
WHERE $1::bytea IS NULL OR restaurant = $1
    "#;
    let (count,): (i64,) = sqlx::query_as(QUERY)
        .bind(filter.restaurant)
        .fetch_one(ex)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use {super::*, crate::byte_array::ByteArray, sqlx::Connection, std::str::FromStr};

    #[tokio::test]
    #[ignore]
    async fn postgres_unique_per_restaurant_and_name() {
        let mut db = PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let restaurant = crate::restaurants::Restaurant {
            wallet: ByteArray([7; 20]),
            store_address: String::new(),
            default_slippage_bps: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        crate::restaurants::insert(&mut db, &restaurant)
            .await
            .unwrap();

        let item = MenuItem {
            restaurant: restaurant.wallet,
            name: "margherita".to_string(),
            price: BigDecimal::from_str("12000000000000000000").unwrap(),
            price_decimals: 18,
            accepted_tokens: vec![ByteArray([1; 20]), ByteArray([2; 20])],
            created_at: Utc::now(),
        };
        assert!(insert(&mut db, &item).await.unwrap());
        assert!(!insert(&mut db, &item).await.unwrap());

        let listed = list(
            &mut db,
            &Filter {
                restaurant: Some(restaurant.wallet),
            },
            &Page::default(),
        )
        .await
        .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].accepted_tokens.len(), 2);

        let other = Filter {
            restaurant: Some(ByteArray([9; 20])),
        };
        assert_eq!(count(&mut db, &other).await.unwrap(), 0);
    }
}
