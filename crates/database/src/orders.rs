//! Orders mirrored from the ledger, keyed by the ledger assigned order id.
//! Rows are immutable once synced; status transitions only ever arrive
//! through the index, never get re-derived locally.

use {
    crate::{Address, TransactionHash, pagination::Page},
    bigdecimal::BigDecimal,
    sqlx::{
        PgConnection,
        types::chrono::{DateTime, Utc},
    },
};

/// Lifecycle of an order as tracked by the ledger.
#[derive(Clone, Copy, Debug, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "OrderStatus", rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    CancelRequestedByCustomer,
    CancelRequestedByRestaurant,
    Cancelled,
    Completed,
}

/// One row in the `orders` table.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Order {
    pub order_id: i64,
    pub customer: Address,
    pub restaurant: Address,
    pub item_name: String,
    /// Price in USD, descaled from the ledger's fixed-point integer.
    pub price_usd: BigDecimal,
    pub payment_token: Address,
    pub status: OrderStatus,
    pub block_number: i64,
    pub tx_hash: TransactionHash,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(ex: &mut PgConnection, order: &Order) -> sqlx::Result<bool> {
    const QUERY: &str = r#"
INSERT INTO orders (
    order_id,
    customer,
    restaurant,
    item_name,
    price_usd,
    payment_token,
    status,
    block_number,
    tx_hash,
    created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT (order_id) DO NOTHING
    "#;
    let result = sqlx::query(QUERY)
        .bind(order.order_id)
        .bind(order.customer)
        .bind(order.restaurant)
        .bind(&order.item_name)
        .bind(&order.price_usd)
        .bind(order.payment_token)
        .bind(order.status)
        .bind(order.block_number)
        .bind(order.tx_hash)
        .bind(order.created_at)
        .execute(ex)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn exists(ex: &mut PgConnection, order_id: i64) -> sqlx::Result<bool> {
    const QUERY: &str = "SELECT EXISTS (SELECT 1 FROM orders WHERE order_id = $1)";
    let (exists,): (bool,) = sqlx::query_as(QUERY).bind(order_id).fetch_one(ex).await?;
    Ok(exists)
}

/// Conjunctive filter for order listings; every set field must match.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub status: Option<OrderStatus>,
    pub payment_token: Option<Address>,
    pub customer: Option<Address>,
    pub restaurant: Option<Address>,
}

const FILTER_CLAUSE: &str = r#"
      ($1::"OrderStatus" IS NULL OR status = $1)
  AND ($2::bytea IS NULL OR payment_token = $2)
  AND ($3::bytea IS NULL OR customer = $3)
  AND ($4::bytea IS NULL OR restaurant = $4)
"#;

pub async fn list(ex: &mut PgConnection, filter: &Filter, page: &Page) -> sqlx::Result<Vec<Order>> {
    let query = format!(
        "SELECT * FROM orders WHERE {FILTER_CLAUSE} ORDER BY order_id DESC LIMIT $5 OFFSET $6"
    );
    sqlx::query_as(&query)
        .bind(filter.status)
        .bind(filter.payment_token)
        .bind(filter.customer)
        .bind(filter.restaurant)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(ex)
        .await
}

pub async fn count(ex: &mut PgConnection, filter: &Filter) -> sqlx::Result<i64> {
    let query = format!("SELECT COUNT(*) FROM orders WHERE {FILTER_CLAUSE}");
    let (count,): (i64,) = sqlx::query_as(&query)
        .bind(filter.status)
        .bind(filter.payment_token)
        .bind(filter.customer)
        .bind(filter.restaurant)
        .fetch_one(ex)
        .await?;
    Ok(count)
}
