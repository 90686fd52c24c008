//! Payments and refunds share the same listing shape; both handlers
//! differ only in which table they read.

use {
    super::{AppState, PageQuery, Paginated, internal_error_reply, parse_address},
    axum::{
        extract::{Query, State},
        response::{IntoResponse, Response},
    },
    chrono::{DateTime, Utc},
    database::settlements,
    serde::{Deserialize, Serialize},
    std::sync::Arc,
};

#[derive(Deserialize)]
pub(crate) struct QueryParams {
    page: Option<i64>,
    limit: Option<i64>,
    customer: Option<String>,
    order_id: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Settlement {
    tx_hash: String,
    log_index: i64,
    customer: String,
    order_id: i64,
    amount_usd: String,
    block_number: i64,
    created_at: DateTime<Utc>,
}

impl From<settlements::Settlement> for Settlement {
    fn from(row: settlements::Settlement) -> Self {
        Self {
            tx_hash: row.tx_hash.to_hex(),
            log_index: row.log_index,
            customer: row.customer.to_hex(),
            order_id: row.order_id,
            amount_usd: row.amount_usd.to_string(),
            block_number: row.block_number,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Payments,
    Refunds,
}

async fn list_settlements(state: Arc<AppState>, query: QueryParams, kind: Kind) -> Response {
    let page = match (PageQuery {
        page: query.page,
        limit: query.limit,
    })
    .validate()
    {
        Ok(page) => page,
        Err(response) => return response,
    };
    let customer = match query.customer.as_deref().map(parse_address).transpose() {
        Ok(customer) => customer,
        Err(response) => return response,
    };
    let filter = settlements::Filter {
        customer,
        order_id: query.order_id,
    };

    let result: sqlx::Result<_> = async {
        let mut ex = state.db.acquire().await?;
        let (data, total) = match kind {
            Kind::Payments => (
                settlements::list_payments(&mut ex, &filter, &page).await?,
                settlements::count_payments(&mut ex, &filter).await?,
            ),
            Kind::Refunds => (
                settlements::list_refunds(&mut ex, &filter, &page).await?,
                settlements::count_refunds(&mut ex, &filter).await?,
            ),
        };
        Ok((data, total))
    }
    .await;

    match result {
        Ok((data, total)) => Paginated::new(data, total, &page, Settlement::from).into_response(),
        Err(err) => {
            tracing::error!(?err, "get_settlements");
            internal_error_reply()
        }
    }
}

pub(crate) async fn get_payments_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryParams>,
) -> Response {
    list_settlements(state, query, Kind::Payments).await
}

pub(crate) async fn get_refunds_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryParams>,
) -> Response {
    list_settlements(state, query, Kind::Refunds).await
}
