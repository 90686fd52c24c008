//! Customers mirrored from the event index, keyed by wallet address.

use {
    crate::{Address, pagination::Page},
    sqlx::{
        PgConnection,
        types::chrono::{DateTime, Utc},
    },
};

/// One row in the `customers` table.
#[derive(Clone, Debug, Eq, PartialEq, sqlx::FromRow)]
pub struct Customer {
    pub wallet: Address,
    /// Real world delivery address; empty when the ledger never saw one.
    pub account_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inserts the customer unless a row with the same wallet already exists.
/// Returns whether a row was actually written.
pub async fn insert(ex: &mut PgConnection, customer: &Customer) -> sqlx::Result<bool> {
    const QUERY: &str = r#"
INSERT INTO customers (wallet, account_address, created_at, updated_at)
VALUES ($1, $2, $3, $4)
ON CONFLICT (wallet) DO NOTHING
    "#;
    let result = sqlx::query(QUERY)
        .bind(customer.wallet)
        .bind(&customer.account_address)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(ex)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn exists(ex: &mut PgConnection, wallet: &Address) -> sqlx::Result<bool> {
    const QUERY: &str = "SELECT EXISTS (SELECT 1 FROM customers WHERE wallet = $1)";
    let (exists,): (bool,) = sqlx::query_as(QUERY).bind(wallet).fetch_one(ex).await?;
    Ok(exists)
}

/// Conjunctive filter for customer listings. `search` matches a substring
/// of either the delivery address or the hex encoded wallet.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub search: Option<String>,
}

impl Filter {
    /// Builds the ILIKE pattern, escaping LIKE metacharacters so the
    /// search term always matches literally.
    fn pattern(&self) -> Option<String> {
        self.search.as_ref().map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }
}

pub async fn list(ex: &mut PgConnection, filter: &Filter, page: &Page) -> sqlx::Result<Vec<Customer>> {
    const QUERY: &str = r#"
SELECT * FROM customers
WHERE $1::text IS NULL
   OR account_address ILIKE $1
   OR encode(wallet, 'hex') ILIKE $1
ORDER BY created_at DESC, wallet
LIMIT $2 OFFSET $3
    "#;
    sqlx::query_as(QUERY)
        .bind(filter.pattern())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(ex)
        .await
}

pub async fn count(ex: &mut PgConnection, filter: &Filter) -> sqlx::Result<i64> {
    const QUERY: &str = r#"
SELECT COUNT(*) FROM customers
WHERE $1::text IS NULL
   OR account_address ILIKE $1
   OR encode(wallet, 'hex') ILIKE $1
    "#;
    let (count,): (i64,) = sqlx::query_as(QUERY)
        .bind(filter.pattern())
        .fetch_one(ex)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::byte_array::ByteArray,
        sqlx::Connection,
    };

    #[test]
    fn search_pattern_escapes_like_metacharacters() {
        let pattern = |search: &str| {
            Filter {
                search: Some(search.to_string()),
            }
            .pattern()
            .unwrap()
        };
        assert_eq!(pattern("galaxy"), "%galaxy%");
        assert_eq!(pattern("100%"), "%100\\%%");
        assert_eq!(pattern("main_st"), "%main\\_st%");
        assert_eq!(pattern("a\\b"), "%a\\\\b%");
        assert_eq!(Filter::default().pattern(), None);
    }

    fn customer(wallet: u8, address: &str) -> Customer {
        Customer {
            wallet: ByteArray([wallet; 20]),
            account_address: address.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_insert_is_idempotent() {
        let mut db = PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        let row = customer(1, "1 Main St");
        assert!(insert(&mut db, &row).await.unwrap());
        assert!(!insert(&mut db, &row).await.unwrap());
        assert_eq!(count(&mut db, &Filter::default()).await.unwrap(), 1);
        assert!(exists(&mut db, &row.wallet).await.unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn postgres_search_matches_address_and_wallet() {
        let mut db = PgConnection::connect("postgresql://").await.unwrap();
        let mut db = db.begin().await.unwrap();
        crate::clear_DANGER_(&mut db).await.unwrap();

        insert(&mut db, &customer(0x11, "42 Galaxy Way")).await.unwrap();
        insert(&mut db, &customer(0x22, "7 Ocean Drive")).await.unwrap();
        insert(&mut db, &customer(0x33, "100% Beef Street")).await.unwrap();

        let page = Page::default();
        let by_address = Filter {
            search: Some("galaxy".to_string()),
        };
        assert_eq!(list(&mut db, &by_address, &page).await.unwrap().len(), 1);

        let by_wallet = Filter {
            search: Some("2222".to_string()),
        };
        let found = list(&mut db, &by_wallet, &page).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].wallet, ByteArray([0x22; 20]));

        // A literal `%` in the search term must not act as a wildcard.
        let literal_percent = Filter {
            search: Some("100%".to_string()),
        };
        let found = list(&mut db, &literal_percent, &page).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].wallet, ByteArray([0x33; 20]));

        assert_eq!(
            list(&mut db, &Filter::default(), &page).await.unwrap().len(),
            3
        );
    }
}
