use {
    super::{AppState, PageQuery, Paginated, error, internal_error_reply, parse_address},
    axum::{
        extract::{Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    chrono::{DateTime, Utc},
    database::orders::{self, OrderStatus},
    serde::{Deserialize, Serialize},
    std::sync::Arc,
};

#[derive(Deserialize)]
pub(crate) struct QueryParams {
    page: Option<i64>,
    limit: Option<i64>,
    status: Option<String>,
    payment_token: Option<String>,
    customer: Option<String>,
    restaurant: Option<String>,
}

fn parse_status(value: &str) -> Result<OrderStatus, Response> {
    match value {
        "placed" => Ok(OrderStatus::Placed),
        "confirmed" => Ok(OrderStatus::Confirmed),
        "cancel_requested_by_customer" => Ok(OrderStatus::CancelRequestedByCustomer),
        "cancel_requested_by_restaurant" => Ok(OrderStatus::CancelRequestedByRestaurant),
        "cancelled" => Ok(OrderStatus::Cancelled),
        "completed" => Ok(OrderStatus::Completed),
        other => Err((
            StatusCode::BAD_REQUEST,
            error("InvalidOrderStatus", format!("unknown status {other}")),
        )
            .into_response()),
    }
}

fn status_name(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Placed => "placed",
        OrderStatus::Confirmed => "confirmed",
        OrderStatus::CancelRequestedByCustomer => "cancel_requested_by_customer",
        OrderStatus::CancelRequestedByRestaurant => "cancel_requested_by_restaurant",
        OrderStatus::Cancelled => "cancelled",
        OrderStatus::Completed => "completed",
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Order {
    order_id: i64,
    customer: String,
    restaurant: String,
    item_name: String,
    price_usd: String,
    payment_token: String,
    status: &'static str,
    block_number: i64,
    tx_hash: String,
    created_at: DateTime<Utc>,
}

impl From<orders::Order> for Order {
    fn from(row: orders::Order) -> Self {
        Self {
            order_id: row.order_id,
            customer: row.customer.to_hex(),
            restaurant: row.restaurant.to_hex(),
            item_name: row.item_name,
            price_usd: row.price_usd.to_string(),
            payment_token: row.payment_token.to_hex(),
            status: status_name(row.status),
            block_number: row.block_number,
            tx_hash: row.tx_hash.to_hex(),
            created_at: row.created_at,
        }
    }
}

fn parse_filter(query: &QueryParams) -> Result<orders::Filter, Response> {
    Ok(orders::Filter {
        status: query.status.as_deref().map(parse_status).transpose()?,
        payment_token: query
            .payment_token
            .as_deref()
            .map(parse_address)
            .transpose()?,
        customer: query.customer.as_deref().map(parse_address).transpose()?,
        restaurant: query.restaurant.as_deref().map(parse_address).transpose()?,
    })
}

pub(crate) async fn get_orders_handler(
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
    let filter = match parse_filter(&query) {
        Ok(filter) => filter,
        Err(response) => return response,
    };

    let result: sqlx::Result<_> = async {
        let mut ex = state.db.acquire().await?;
        let data = orders::list(&mut ex, &filter, &page).await?;
        let total = orders::count(&mut ex, &filter).await?;
        Ok((data, total))
    }
    .await;

    match result {
        Ok((data, total)) => Paginated::new(data, total, &page, Order::from).into_response(),
        Err(err) => {
            tracing::error!(?err, "get_orders");
            internal_error_reply()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_values_round_trip() {
        for status in [
            OrderStatus::Placed,
            OrderStatus::Confirmed,
            OrderStatus::CancelRequestedByCustomer,
            OrderStatus::CancelRequestedByRestaurant,
            OrderStatus::Cancelled,
            OrderStatus::Completed,
        ] {
            assert_eq!(parse_status(status_name(status)).unwrap(), status);
        }
        assert!(parse_status("PLACED").is_err());
        assert!(parse_status("delivered").is_err());
    }
}
