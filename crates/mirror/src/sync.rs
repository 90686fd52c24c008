//! Pulls the event index into the local store. Sub-syncs run in
//! dependency order so parent rows exist before their children; records
//! that fail validation or miss their parent are skipped and reported,
//! never aborting the pass. Inserts are keyed by ledger identity, so a
//! pass over an unchanged index is a no-op.

use {
    crate::index::{self, EventIndexing},
    alloy::primitives::U256,
    anyhow::{Context, Result, ensure},
    chrono::{DateTime, Utc},
    database::{
        Address,
        TransactionHash,
        customers,
        menu_items,
        orders::{self, OrderStatus},
        price_updates,
        restaurants,
        settlements,
    },
    number::{conversions::u256_to_big_decimal, units},
    serde::{Deserialize, Serialize},
    sqlx::PgPool,
    std::{str::FromStr, sync::Arc},
};

/// The collections the engine can synchronize individually.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Customers,
    Restaurants,
    MenuItems,
    Orders,
    PriceUpdates,
    Payments,
    Refunds,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Self::Customers => "customers",
            Self::Restaurants => "restaurants",
            Self::MenuItems => "menu_items",
            Self::Orders => "orders",
            Self::PriceUpdates => "price_updates",
            Self::Payments => "payments",
            Self::Refunds => "refunds",
        };
        f.write_str(name)
    }
}

/// A record the pass left out, keyed well enough to find it in the index.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skip {
    pub entity: Entity,
    pub key: String,
    pub reason: String,
}

/// Outcome of one synchronization pass.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub inserted: usize,
    pub already_present: usize,
    pub skipped: Vec<Skip>,
}

impl SyncReport {
    fn record_insert(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.already_present += 1;
        }
    }

    fn skip(&mut self, entity: Entity, key: impl Into<String>, reason: impl std::fmt::Display) {
        let skip = Skip {
            entity,
            key: key.into(),
            reason: reason.to_string(),
        };
        tracing::debug!(entity = %skip.entity, key = %skip.key, reason = %skip.reason, "skipping record");
        self.skipped.push(skip);
    }

    fn merge(&mut self, other: SyncReport) {
        self.inserted += other.inserted;
        self.already_present += other.already_present;
        self.skipped.extend(other.skipped);
    }
}

pub struct SyncEngine {
    index: Arc<dyn EventIndexing>,
    db: PgPool,
}

impl SyncEngine {
    pub fn new(index: Arc<dyn EventIndexing>, db: PgPool) -> Self {
        Self { index, db }
    }

    /// Runs every sub-sync in dependency order. An index or database
    /// failure aborts the remainder of the pass; per-record problems only
    /// show up as skips in the report.
    pub async fn sync_all(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        report.merge(self.sync_customers().await?);
        report.merge(self.sync_restaurants().await?);
        report.merge(self.sync_menu_items().await?);
        report.merge(self.sync_orders().await?);
        report.merge(self.sync_price_updates().await?);
        report.merge(self.sync_payments().await?);
        report.merge(self.sync_refunds().await?);
        tracing::info!(
            inserted = report.inserted,
            already_present = report.already_present,
            skipped = report.skipped.len(),
            "full sync pass finished"
        );
        Ok(report)
    }

    /// The faster cadence only covering settlement events.
    pub async fn sync_settlements(&self) -> Result<SyncReport> {
        let mut report = self.sync_payments().await?;
        report.merge(self.sync_refunds().await?);
        Ok(report)
    }

    pub async fn sync_entity(&self, entity: Entity) -> Result<SyncReport> {
        match entity {
            Entity::Customers => self.sync_customers().await,
            Entity::Restaurants => self.sync_restaurants().await,
            Entity::MenuItems => self.sync_menu_items().await,
            Entity::Orders => self.sync_orders().await,
            Entity::PriceUpdates => self.sync_price_updates().await,
            Entity::Payments => self.sync_payments().await,
            Entity::Refunds => self.sync_refunds().await,
        }
    }

    pub async fn sync_customers(&self) -> Result<SyncReport> {
        let records = self.index.customers().await?;
        let mut ex = self.db.acquire().await?;
        let mut report = SyncReport::default();
        for record in records {
            match map_customer(&record) {
                Ok(row) => report.record_insert(customers::insert(&mut ex, &row).await?),
                Err(err) => report.skip(Entity::Customers, &record.id, format!("{err:#}")),
            }
        }
        Ok(report)
    }

    pub async fn sync_restaurants(&self) -> Result<SyncReport> {
        let records = self.index.restaurants().await?;
        let mut ex = self.db.acquire().await?;
        let mut report = SyncReport::default();
        for record in records {
            match map_restaurant(&record) {
                Ok(row) => report.record_insert(restaurants::insert(&mut ex, &row).await?),
                Err(err) => report.skip(Entity::Restaurants, &record.id, format!("{err:#}")),
            }
        }
        Ok(report)
    }

    pub async fn sync_menu_items(&self) -> Result<SyncReport> {
        let records = self.index.menu_items().await?;
        let mut ex = self.db.acquire().await?;
        let mut report = SyncReport::default();
        for record in records {
            let key = format!("{}/{}", record.restaurant, record.name);
            let row = match map_menu_item(&record) {
                Ok(row) => row,
                Err(err) => {
                    report.skip(Entity::MenuItems, key, format!("{err:#}"));
                    continue;
                }
            };
            if !restaurants::exists(&mut ex, &row.restaurant).await? {
                report.skip(Entity::MenuItems, key, "restaurant not synced yet");
                continue;
            }
            report.record_insert(menu_items::insert(&mut ex, &row).await?);
        }
        Ok(report)
    }

    pub async fn sync_orders(&self) -> Result<SyncReport> {
        let records = self.index.orders().await?;
        let mut ex = self.db.acquire().await?;
        let mut report = SyncReport::default();
        for record in records {
            let row = match map_order(&record) {
                Ok(row) => row,
                Err(err) => {
                    report.skip(Entity::Orders, &record.order_id, format!("{err:#}"));
                    continue;
                }
            };
            if !customers::exists(&mut ex, &row.customer).await? {
                report.skip(Entity::Orders, &record.order_id, "customer not synced yet");
                continue;
            }
            if !restaurants::exists(&mut ex, &row.restaurant).await? {
                report.skip(Entity::Orders, &record.order_id, "restaurant not synced yet");
                continue;
            }
            report.record_insert(orders::insert(&mut ex, &row).await?);
        }
        Ok(report)
    }

    pub async fn sync_price_updates(&self) -> Result<SyncReport> {
        let records = self.index.price_updates().await?;
        let mut ex = self.db.acquire().await?;
        let mut report = SyncReport::default();
        for record in records {
            let key = format!("{}/{}", record.item_name, record.tx_hash);
            match map_price_update(&record) {
                Ok(row) => report.record_insert(price_updates::insert(&mut ex, &row).await?),
                Err(err) => report.skip(Entity::PriceUpdates, key, format!("{err:#}")),
            }
        }
        Ok(report)
    }

    pub async fn sync_payments(&self) -> Result<SyncReport> {
        let records = self.index.payments().await?;
        self.sync_settlement_records(Entity::Payments, records)
            .await
    }

    pub async fn sync_refunds(&self) -> Result<SyncReport> {
        let records = self.index.refunds().await?;
        self.sync_settlement_records(Entity::Refunds, records).await
    }

    async fn sync_settlement_records(
        &self,
        entity: Entity,
        records: Vec<index::Settlement>,
    ) -> Result<SyncReport> {
        let mut ex = self.db.acquire().await?;
        let mut report = SyncReport::default();
        for record in records {
            let key = format!("{}/{}", record.tx_hash, record.log_index);
            let row = match map_settlement(&record) {
                Ok(row) => row,
                Err(err) => {
                    report.skip(entity, key, format!("{err:#}"));
                    continue;
                }
            };
            if !orders::exists(&mut ex, row.order_id).await? {
                report.skip(entity, key, "order not synced yet");
                continue;
            }
            let inserted = match entity {
                Entity::Payments => settlements::insert_payment(&mut ex, &row).await?,
                Entity::Refunds => settlements::insert_refund(&mut ex, &row).await?,
                _ => unreachable!("settlement sync called for {entity}"),
            };
            report.record_insert(inserted);
        }
        Ok(report)
    }
}

fn parse_address(hex: &str) -> Result<Address> {
    Address::from_hex(hex).with_context(|| format!("invalid address {hex:?}"))
}

fn parse_tx_hash(hex: &str) -> Result<TransactionHash> {
    TransactionHash::from_hex(hex).with_context(|| format!("invalid transaction hash {hex:?}"))
}

fn parse_timestamp(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0).with_context(|| format!("invalid timestamp {seconds}"))
}

fn parse_raw_price(raw: &str) -> Result<U256> {
    U256::from_str(raw).with_context(|| format!("invalid fixed-point price {raw:?}"))
}

fn parse_status(status: &str) -> Result<OrderStatus> {
    Ok(match status {
        "PLACED" => OrderStatus::Placed,
        "CONFIRMED" => OrderStatus::Confirmed,
        "CANCEL_REQUESTED_BY_CUSTOMER" => OrderStatus::CancelRequestedByCustomer,
        "CANCEL_REQUESTED_BY_RESTAURANT" => OrderStatus::CancelRequestedByRestaurant,
        "CANCELLED" => OrderStatus::Cancelled,
        "COMPLETED" => OrderStatus::Completed,
        other => anyhow::bail!("unknown order status {other:?}"),
    })
}

fn map_customer(record: &index::Customer) -> Result<customers::Customer> {
    Ok(customers::Customer {
        wallet: parse_address(&record.id)?,
        account_address: record.account_address.clone(),
        created_at: parse_timestamp(record.created_at)?,
        updated_at: parse_timestamp(record.updated_at)?,
    })
}

fn map_restaurant(record: &index::Restaurant) -> Result<restaurants::Restaurant> {
    ensure!(
        (0..=10_000).contains(&record.default_slippage_bps),
        "slippage {} outside [0, 10000] bps",
        record.default_slippage_bps
    );
    Ok(restaurants::Restaurant {
        wallet: parse_address(&record.id)?,
        store_address: record.store_address.clone(),
        default_slippage_bps: record.default_slippage_bps,
        created_at: parse_timestamp(record.created_at)?,
        updated_at: parse_timestamp(record.updated_at)?,
    })
}

fn map_menu_item(record: &index::MenuItem) -> Result<menu_items::MenuItem> {
    ensure!(!record.name.is_empty(), "empty item name");
    ensure!(
        record.price_decimals >= 0,
        "negative price decimals {}",
        record.price_decimals
    );
    let raw = parse_raw_price(&record.price)?;
    let accepted_tokens = record
        .accepted_tokens
        .iter()
        .map(|token| parse_address(token))
        .collect::<Result<Vec<_>>>()?;
    Ok(menu_items::MenuItem {
        restaurant: parse_address(&record.restaurant)?,
        name: record.name.clone(),
        price: u256_to_big_decimal(&raw),
        price_decimals: record.price_decimals,
        accepted_tokens,
        created_at: parse_timestamp(record.created_at)?,
    })
}

fn map_order(record: &index::Order) -> Result<orders::Order> {
    let order_id = i64::from_str(&record.order_id)
        .with_context(|| format!("invalid order id {:?}", record.order_id))?;
    let raw = parse_raw_price(&record.price)?;
    Ok(orders::Order {
        order_id,
        customer: parse_address(&record.customer)?,
        restaurant: parse_address(&record.restaurant)?,
        item_name: record.item_name.clone(),
        price_usd: units::descale_usd(&raw),
        payment_token: parse_address(&record.payment_token)?,
        status: parse_status(&record.status)?,
        block_number: record.block_number,
        tx_hash: parse_tx_hash(&record.tx_hash)?,
        created_at: parse_timestamp(record.created_at)?,
    })
}

fn map_price_update(record: &index::PriceUpdate) -> Result<price_updates::PriceUpdate> {
    let old_raw = parse_raw_price(&record.old_price)?;
    let new_raw = parse_raw_price(&record.new_price)?;
    Ok(price_updates::PriceUpdate {
        item_name: record.item_name.clone(),
        old_price_usd: units::descale_usd(&old_raw),
        new_price_usd: units::descale_usd(&new_raw),
        block_number: record.block_number,
        tx_hash: parse_tx_hash(&record.tx_hash)?,
        created_at: parse_timestamp(record.created_at)?,
    })
}

fn map_settlement(record: &index::Settlement) -> Result<settlements::Settlement> {
    let order_id = i64::from_str(&record.order_id)
        .with_context(|| format!("invalid order id {:?}", record.order_id))?;
    let raw = parse_raw_price(&record.amount)?;
    Ok(settlements::Settlement {
        tx_hash: parse_tx_hash(&record.tx_hash)?,
        log_index: record.log_index,
        customer: parse_address(&record.customer)?,
        order_id,
        amount_usd: units::descale_usd(&raw),
        block_number: record.block_number,
        created_at: parse_timestamp(record.created_at)?,
    })
}
