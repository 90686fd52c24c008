use {
    super::{AppState, PageQuery, Paginated, internal_error_reply},
    axum::{
        extract::{Query, State},
        response::{IntoResponse, Response},
    },
    chrono::{DateTime, Utc},
    database::price_updates,
    serde::{Deserialize, Serialize},
    std::sync::Arc,
};

#[derive(Deserialize)]
pub(crate) struct QueryParams {
    page: Option<i64>,
    limit: Option<i64>,
    item: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceUpdate {
    item_name: String,
    old_price_usd: String,
    new_price_usd: String,
    block_number: i64,
    tx_hash: String,
    created_at: DateTime<Utc>,
}

impl From<price_updates::PriceUpdate> for PriceUpdate {
    fn from(row: price_updates::PriceUpdate) -> Self {
        Self {
            item_name: row.item_name,
            old_price_usd: row.old_price_usd.to_string(),
            new_price_usd: row.new_price_usd.to_string(),
            block_number: row.block_number,
            tx_hash: row.tx_hash.to_hex(),
            created_at: row.created_at,
        }
    }
}

pub(crate) async fn get_price_updates_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryParams>,
) -> Response {
    let page = match (PageQuery {
        page: query.page,
        limit: query.limit,
    })
    .validate()
    {
        Ok(page) => page,
        Err(response) => return response,
    };
    let filter = price_updates::Filter { item: query.item };

    let result: sqlx::Result<_> = async {
        let mut ex = state.db.acquire().await?;
        let data = price_updates::list(&mut ex, &filter, &page).await?;
        let total = price_updates::count(&mut ex, &filter).await?;
        Ok((data, total))
    }
    .await;

    match result {
        Ok((data, total)) => Paginated::new(data, total, &page, PriceUpdate::from).into_response(),
        Err(err) => {
            tracing::error!(?err, "get_price_updates");
            internal_error_reply()
        }
    }
}
