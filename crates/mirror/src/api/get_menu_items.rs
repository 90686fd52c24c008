use {
    super::{AppState, PageQuery, Paginated, internal_error_reply, parse_address},
    axum::{
        extract::{Query, State},
        response::{IntoResponse, Response},
    },
    chrono::{DateTime, Utc},
    database::menu_items,
    serde::{Deserialize, Serialize},
    std::sync::Arc,
};

#[derive(Deserialize)]
pub(crate) struct QueryParams {
    page: Option<i64>,
    limit: Option<i64>,
    restaurant: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MenuItem {
    restaurant: String,
    name: String,
    /// Raw fixed-point price integer, untouched since indexing.
    price: String,
    price_decimals: i32,
    accepted_tokens: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<menu_items::MenuItem> for MenuItem {
    fn from(row: menu_items::MenuItem) -> Self {
        Self {
            restaurant: row.restaurant.to_hex(),
            name: row.name,
            price: row.price.to_string(),
            price_decimals: row.price_decimals,
            accepted_tokens: row
                .accepted_tokens
                .iter()
                .map(|token| token.to_hex())
                .collect(),
            created_at: row.created_at,
        }
    }
}

pub(crate) async fn get_menu_items_handler(
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
    let restaurant = match query.restaurant.as_deref().map(parse_address).transpose() {
        Ok(restaurant) => restaurant,
        Err(response) => return response,
    };
    let filter = menu_items::Filter { restaurant };

    let result: sqlx::Result<_> = async {
        let mut ex = state.db.acquire().await?;
        let data = menu_items::list(&mut ex, &filter, &page).await?;
        let total = menu_items::count(&mut ex, &filter).await?;
        Ok((data, total))
    }
    .await;

    match result {
        Ok((data, total)) => Paginated::new(data, total, &page, MenuItem::from).into_response(),
        Err(err) => {
            tracing::error!(?err, "get_menu_items");
            internal_error_reply()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_restaurant_filter() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("not hex at all").is_err());
        assert!(parse_address(&format!("0x{}", "ab".repeat(20))).is_ok());
    }
}
