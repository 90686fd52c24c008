use {
    super::{AppState, PageQuery, Paginated, internal_error_reply},
    axum::{
        extract::{Query, State},
        response::{IntoResponse, Response},
    },
    chrono::{DateTime, Utc},
    database::restaurants,
    serde::{Deserialize, Serialize},
    std::sync::Arc,
};

#[derive(Deserialize)]
pub(crate) struct QueryParams {
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Restaurant {
    wallet: String,
    store_address: String,
    default_slippage_bps: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<restaurants::Restaurant> for Restaurant {
    fn from(row: restaurants::Restaurant) -> Self {
        Self {
            wallet: row.wallet.to_hex(),
            store_address: row.store_address,
            default_slippage_bps: row.default_slippage_bps,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) async fn get_restaurants_handler(
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

    let result: sqlx::Result<_> = async {
        let mut ex = state.db.acquire().await?;
        let data = restaurants::list(&mut ex, &page).await?;
        let total = restaurants::count(&mut ex).await?;
        Ok((data, total))
    }
    .await;

    match result {
        Ok((data, total)) => Paginated::new(data, total, &page, Restaurant::from).into_response(),
        Err(err) => {
            tracing::error!(?err, "get_restaurants");
            internal_error_reply()
        }
    }
}
