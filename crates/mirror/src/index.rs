//! Typed client for the GraphQL event index. One query per collection,
//! always fetching the full collection; the idempotent inserts downstream
//! make re-fetching cheap in effect even though it is not incremental.
//!
//! Scalar fields the index derives itself (timestamps, block numbers)
//! decode strictly. Entity keys, addresses, prices and statuses stay
//! strings here and are validated per record by the sync engine, so one
//! malformed record cannot poison a whole pass.

use {
    anyhow::{Context, Result},
    serde::{Deserialize, de::DeserializeOwned},
    serde_with::{DisplayFromStr, serde_as},
    std::time::Duration,
    subgraph::SubgraphClient,
    url::Url,
};

#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    /// Wallet address, hex.
    pub id: String,
    pub account_address: String,
    #[serde_as(as = "DisplayFromStr")]
    pub created_at: i64,
    #[serde_as(as = "DisplayFromStr")]
    pub updated_at: i64,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    /// Wallet address, hex.
    pub id: String,
    pub store_address: String,
    #[serde_as(as = "DisplayFromStr")]
    pub default_slippage_bps: i32,
    #[serde_as(as = "DisplayFromStr")]
    pub created_at: i64,
    #[serde_as(as = "DisplayFromStr")]
    pub updated_at: i64,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    /// Restaurant wallet address, hex.
    pub restaurant: String,
    pub name: String,
    /// Raw fixed-point price integer, decimal string.
    pub price: String,
    #[serde_as(as = "DisplayFromStr")]
    pub price_decimals: i32,
    pub accepted_tokens: Vec<String>,
    #[serde_as(as = "DisplayFromStr")]
    pub created_at: i64,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Ledger assigned order id, decimal string.
    pub order_id: String,
    pub customer: String,
    pub restaurant: String,
    pub item_name: String,
    /// Raw fixed-point E18 price integer, decimal string.
    pub price: String,
    pub payment_token: String,
    pub status: String,
    #[serde_as(as = "DisplayFromStr")]
    pub block_number: i64,
    pub tx_hash: String,
    #[serde_as(as = "DisplayFromStr")]
    pub created_at: i64,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub item_name: String,
    /// Raw fixed-point E18 integers, decimal strings.
    pub old_price: String,
    pub new_price: String,
    #[serde_as(as = "DisplayFromStr")]
    pub block_number: i64,
    pub tx_hash: String,
    #[serde_as(as = "DisplayFromStr")]
    pub created_at: i64,
}

/// A payment or refund event; the two collections share one shape.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub tx_hash: String,
    #[serde_as(as = "DisplayFromStr")]
    pub log_index: i64,
    pub customer: String,
    pub order_id: String,
    /// Raw fixed-point E18 amount, decimal string.
    pub amount: String,
    #[serde_as(as = "DisplayFromStr")]
    pub block_number: i64,
    #[serde_as(as = "DisplayFromStr")]
    pub created_at: i64,
}

/// The seam the sync engine consumes; mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait EventIndexing: Send + Sync + 'static {
    async fn customers(&self) -> Result<Vec<Customer>>;
    async fn restaurants(&self) -> Result<Vec<Restaurant>>;
    async fn menu_items(&self) -> Result<Vec<MenuItem>>;
    async fn orders(&self) -> Result<Vec<Order>>;
    async fn price_updates(&self) -> Result<Vec<PriceUpdate>>;
    async fn payments(&self) -> Result<Vec<Settlement>>;
    async fn refunds(&self) -> Result<Vec<Settlement>>;
}

const CUSTOMERS_QUERY: &str = r#"
    {
        customers {
            id
            accountAddress
            createdAt
            updatedAt
        }
    }
"#;

const RESTAURANTS_QUERY: &str = r#"
    {
        restaurants {
            id
            storeAddress
            defaultSlippageBps
            createdAt
            updatedAt
        }
    }
"#;

const MENU_ITEMS_QUERY: &str = r#"
    {
        menuItems {
            restaurant
            name
            price
            priceDecimals
            acceptedTokens
            createdAt
        }
    }
"#;

const ORDERS_QUERY: &str = r#"
    {
        orders {
            orderId
            customer
            restaurant
            itemName
            price
            paymentToken
            status
            blockNumber
            txHash
            createdAt
        }
    }
"#;

const PRICE_UPDATES_QUERY: &str = r#"
    {
        priceUpdates {
            itemName
            oldPrice
            newPrice
            blockNumber
            txHash
            createdAt
        }
    }
"#;

const PAYMENTS_QUERY: &str = r#"
    {
        payments {
            txHash
            logIndex
            customer
            orderId
            amount
            blockNumber
            createdAt
        }
    }
"#;

const REFUNDS_QUERY: &str = r#"
    {
        refunds {
            txHash
            logIndex
            customer
            orderId
            amount
            blockNumber
            createdAt
        }
    }
"#;

pub struct IndexClient {
    subgraph: SubgraphClient,
    deadline: Duration,
}

impl IndexClient {
    pub fn new(url: Url, client: reqwest::Client, deadline: Duration) -> Self {
        Self {
            subgraph: SubgraphClient::new(url, client),
            deadline,
        }
    }

    async fn query<T>(&self, query: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        tokio::time::timeout(self.deadline, self.subgraph.query(query, None))
            .await
            .with_context(|| format!("event index query timed out after {:?}", self.deadline))?
    }
}

#[async_trait::async_trait]
impl EventIndexing for IndexClient {
    async fn customers(&self) -> Result<Vec<Customer>> {
        #[derive(Deserialize)]
        struct Data {
            customers: Vec<Customer>,
        }
        Ok(self.query::<Data>(CUSTOMERS_QUERY).await?.customers)
    }

    async fn restaurants(&self) -> Result<Vec<Restaurant>> {
        #[derive(Deserialize)]
        struct Data {
            restaurants: Vec<Restaurant>,
        }
        Ok(self.query::<Data>(RESTAURANTS_QUERY).await?.restaurants)
    }

    async fn menu_items(&self) -> Result<Vec<MenuItem>> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "menuItems")]
            menu_items: Vec<MenuItem>,
        }
        Ok(self.query::<Data>(MENU_ITEMS_QUERY).await?.menu_items)
    }

    async fn orders(&self) -> Result<Vec<Order>> {
        #[derive(Deserialize)]
        struct Data {
            orders: Vec<Order>,
        }
        Ok(self.query::<Data>(ORDERS_QUERY).await?.orders)
    }

    async fn price_updates(&self) -> Result<Vec<PriceUpdate>> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "priceUpdates")]
            price_updates: Vec<PriceUpdate>,
        }
        Ok(self.query::<Data>(PRICE_UPDATES_QUERY).await?.price_updates)
    }

    async fn payments(&self) -> Result<Vec<Settlement>> {
        #[derive(Deserialize)]
        struct Data {
            payments: Vec<Settlement>,
        }
        Ok(self.query::<Data>(PAYMENTS_QUERY).await?.payments)
    }

    async fn refunds(&self) -> Result<Vec<Settlement>> {
        #[derive(Deserialize)]
        struct Data {
            refunds: Vec<Settlement>,
        }
        Ok(self.query::<Data>(REFUNDS_QUERY).await?.refunds)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn decode_customer() {
        let customer: Customer = serde_json::from_value(json!({
            "id": "0x9c58bacc331c9aa871afd802db6379a98e80cedb",
            "accountAddress": "12 Main Street",
            "createdAt": "1717777777",
            "updatedAt": "1717777790",
        }))
        .unwrap();
        assert_eq!(
            customer,
            Customer {
                id: "0x9c58bacc331c9aa871afd802db6379a98e80cedb".to_string(),
                account_address: "12 Main Street".to_string(),
                created_at: 1717777777,
                updated_at: 1717777790,
            }
        );
    }

    #[test]
    fn decode_menu_item() {
        let item: MenuItem = serde_json::from_value(json!({
            "restaurant": "0x0000000000000000000000000000000000000002",
            "name": "margherita",
            "price": "12000000000000000000",
            "priceDecimals": "18",
            "acceptedTokens": [
                "0x0000000000000000000000000000000000000010",
            ],
            "createdAt": "1717777777",
        }))
        .unwrap();
        assert_eq!(item.price, "12000000000000000000");
        assert_eq!(item.price_decimals, 18);
        assert_eq!(item.accepted_tokens.len(), 1);
    }

    #[test]
    fn decode_order() {
        let order: Order = serde_json::from_value(json!({
            "orderId": "7",
            "customer": "0x0000000000000000000000000000000000000001",
            "restaurant": "0x0000000000000000000000000000000000000002",
            "itemName": "margherita",
            "price": "12500000000000000000",
            "paymentToken": "0x0000000000000000000000000000000000000010",
            "status": "PLACED",
            "blockNumber": "123456",
            "txHash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
            "createdAt": "1717777777",
        }))
        .unwrap();
        assert_eq!(order.order_id, "7");
        assert_eq!(order.block_number, 123456);
        assert_eq!(order.status, "PLACED");
    }

    #[test]
    fn decode_settlement() {
        let payment: Settlement = serde_json::from_value(json!({
            "txHash": "0x00000000000000000000000000000000000000000000000000000000000000aa",
            "logIndex": "3",
            "customer": "0x0000000000000000000000000000000000000001",
            "orderId": "7",
            "amount": "12500000000000000000",
            "blockNumber": "123460",
            "createdAt": "1717777800",
        }))
        .unwrap();
        assert_eq!(payment.log_index, 3);
        assert_eq!(payment.order_id, "7");
    }

    #[test]
    fn non_numeric_block_number_is_rejected() {
        let result: Result<PriceUpdate, _> = serde_json::from_value(json!({
            "itemName": "margherita",
            "oldPrice": "12000000000000000000",
            "newPrice": "12500000000000000000",
            "blockNumber": "not-a-number",
            "txHash": "0xaa",
            "createdAt": "1717777777",
        }));
        assert!(result.is_err());
    }
}
