use {
    super::{AppState, PageQuery, Paginated, internal_error_reply},
    axum::{
        extract::{Query, State},
        response::{IntoResponse, Response},
    },
    chrono::{DateTime, Utc},
    database::customers,
    serde::{Deserialize, Serialize},
    std::sync::Arc,
};

#[derive(Deserialize)]
pub(crate) struct QueryParams {
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Customer {
    wallet: String,
    account_address: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<customers::Customer> for Customer {
    fn from(row: customers::Customer) -> Self {
        Self {
            wallet: row.wallet.to_hex(),
            account_address: row.account_address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) async fn get_customers_handler(
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
    let filter = customers::Filter {
        search: query.search,
    };

    let result: sqlx::Result<_> = async {
        let mut ex = state.db.acquire().await?;
        let data = customers::list(&mut ex, &filter, &page).await?;
        let total = customers::count(&mut ex, &filter).await?;
        Ok((data, total))
    }
    .await;

    match result {
        Ok((data, total)) => Paginated::new(data, total, &page, Customer::from).into_response(),
        Err(err) => {
            tracing::error!(?err, "get_customers");
            internal_error_reply()
        }
    }
}
