use {
    super::{AppState, error, oracle_error_reply},
    alloy::primitives::Address,
    axum::{
        extract::{Query, State},
        http::StatusCode,
        response::{IntoResponse, Json, Response},
    },
    oracle::PriceTarget,
    serde::{Deserialize, Serialize},
    std::{str::FromStr, sync::Arc},
};

#[derive(Deserialize)]
pub(crate) struct QueryParams {
    token: Option<String>,
}

/// Resolves the optional `token` parameter into a price target; no token
/// means the native asset.
pub(super) fn parse_target(token: Option<&str>) -> Result<PriceTarget, Response> {
    match token {
        None => Ok(PriceTarget::Native),
        Some(value) => Address::from_str(value)
            .map(PriceTarget::Token)
            .map_err(|_| {
                (
                    StatusCode::BAD_REQUEST,
                    error("InvalidAddress", format!("{value} is not a valid address")),
                )
                    .into_response()
            }),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Price {
    target: String,
    price_usd: String,
}

pub(crate) async fn get_oracle_price_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueryParams>,
) -> Response {
    let target = match parse_target(query.token.as_deref()) {
        Ok(target) => target,
        Err(response) => return response,
    };

    match state.oracle.current_price(target).await {
        Ok(price) => Json(Price {
            target: target.to_string(),
            price_usd: price.to_string(),
        })
        .into_response(),
        Err(err) => oracle_error_reply(err),
    }
}
