use {
    super::{AppState, error, get_oracle_price::parse_target, oracle_error_reply},
    crate::auth::{self, Role},
    axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Json, Response},
    },
    bigdecimal::BigDecimal,
    serde::{Deserialize, Serialize},
    std::{str::FromStr, sync::Arc},
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct Payload {
    pub token: Option<String>,
    /// Decimal USD price, e.g. `"12.50"`.
    pub price_usd: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Pushed {
    target: String,
    price_usd: String,
    tx_hash: String,
}

pub(super) fn parse_price(value: &str) -> Result<BigDecimal, Response> {
    BigDecimal::from_str(value).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            error("InvalidPrice", format!("{value} is not a decimal price")),
        )
            .into_response()
    })
}

pub(crate) async fn post_oracle_price_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Payload>,
) -> Response {
    if let Err(response) = auth::authorize(&state.verifier, &headers, Role::Admin) {
        return response;
    }
    let target = match parse_target(payload.token.as_deref()) {
        Ok(target) => target,
        Err(response) => return response,
    };
    let price = match parse_price(&payload.price_usd) {
        Ok(price) => price,
        Err(response) => return response,
    };

    match state.oracle.set_price(target, &price).await {
        Ok(tx_hash) => Json(Pushed {
            target: target.to_string(),
            price_usd: price.to_string(),
            tx_hash: format!("{tx_hash:#x}"),
        })
        .into_response(),
        Err(err) => oracle_error_reply(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_must_be_decimal() {
        assert_eq!(parse_price("12.50").unwrap(), BigDecimal::from_str("12.5").unwrap());
        assert!(parse_price("twelve").is_err());
        assert!(parse_price("").is_err());
    }
}
