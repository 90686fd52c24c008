//! Payments and refunds mirrored from deposit/refund ledger events.
//! Both tables share the same append-only shape and are keyed by
//! (transaction hash, log index).

use {
    crate::{Address, TransactionHash, pagination::Page},
    bigdecimal::BigDecimal,
    sqlx::{
        PgConnection,
        types::chrono::{DateTime, Utc},
    },
};

/// One row in the `payments` or `refunds` table.
#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Settlement {
    pub tx_hash: TransactionHash,
    pub log_index: i64,
    pub customer: Address,
    pub order_id: i64,
    pub amount_usd: BigDecimal,
    pub block_number: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub customer: Option<Address>,
    pub order_id: Option<i64>,
}

macro_rules! settlement_queries {
    ($insert:ident, $list:ident, $count:ident, $table:literal) => {
        pub async fn $insert(ex: &mut PgConnection, row: &Settlement) -> sqlx::Result<bool> {
            const QUERY: &str = concat!(
                "INSERT INTO ",
                $table,
                " (tx_hash, log_index, customer, order_id, amount_usd, block_number, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (tx_hash, log_index) DO NOTHING"
            );
            let result = sqlx::query(QUERY)
                .bind(row.tx_hash)
                .bind(row.log_index)
                .bind(row.customer)
                .bind(row.order_id)
                .bind(&row.amount_usd)
                .bind(row.block_number)
                .bind(row.created_at)
                .execute(ex)
                .await?;
            Ok(result.rows_affected() > 0)
        }

        pub async fn $list(
            ex: &mut PgConnection,
            filter: &Filter,
            page: &Page,
        ) -> sqlx::Result<Vec<Settlement>> {
            const QUERY: &str = concat!(
                "SELECT * FROM ",
                $table,
                " WHERE ($1::bytea IS NULL OR customer = $1)
                    AND ($2::bigint IS NULL OR order_id = $2)
                  ORDER BY block_number DESC, tx_hash, log_index
                  LIMIT $3 OFFSET $4"
            );
            sqlx::query_as(QUERY)
                .bind(filter.customer)
                .bind(filter.order_id)
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(ex)
                .await
        }

        pub async fn $count(ex: &mut PgConnection, filter: &Filter) -> sqlx::Result<i64> {
            const QUERY: &str = concat!(
                "SELECT COUNT(*) FROM ",
                $table,
                " WHERE ($1::bytea IS NULL OR customer = $1)
                    AND ($2::bigint IS NULL OR order_id = $2)"
            );
            let (count,): (i64,) = sqlx::query_as(QUERY)
                .bind(filter.customer)
                .bind(filter.order_id)
                .fetch_one(ex)
                .await?;
            Ok(count)
        }
    };
}

settlement_queries!(insert_payment, list_payments, count_payments, "payments");
settlement_queries!(insert_refund, list_refunds, count_refunds, "refunds");

#[cfg(test)]
mod tests {
    use {super::*, crate::byte_array::ByteArray, sqlx::Connection, std::str::FromStr};

    fn settlement(tx: u8, log_index: i64, order_id: i64) -> Settlement {
        Settlement {
            tx_hash: ByteArray([tx; 32]),
            log_index,
            customer: ByteArray([1; 20]),
            order_id,
            amount_usd: BigDecimal::from_str("25").unwrap(),
            block_number: 10,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_payments_and_refunds_are_independent() {
        let mut db = PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let row = settlement(1, 0, 42);
        assert!(insert_payment(&mut db, &row).await.unwrap());
        assert!(!insert_payment(&mut db, &row).await.unwrap());
        // Two logs of the same transaction are distinct events.
        assert!(insert_payment(&mut db, &settlement(1, 1, 42)).await.unwrap());
        // The refund table has its own key space.
        assert!(insert_refund(&mut db, &row).await.unwrap());

        let by_order = Filter {
            order_id: Some(42),
            ..Default::default()
        };
        assert_eq!(count_payments(&mut db, &by_order).await.unwrap(), 2);
        assert_eq!(count_refunds(&mut db, &by_order).await.unwrap(), 1);

        let listed = list_payments(&mut db, &Filter::default(), &Page::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
    }
}
