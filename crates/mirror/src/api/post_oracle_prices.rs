//! Batch price push. The whole batch is validated up front so a caller
//! never pays for half a malformed request; pushes themselves are
//! independent and each entry reports its own outcome.

use {
    super::{AppState, error, get_oracle_price::parse_target, post_oracle_price},
    crate::auth::{self, Role},
    axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Json, Response},
    },
    serde::Serialize,
    std::sync::Arc,
};

const MAX_BATCH_SIZE: usize = 20;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Outcome {
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub(crate) async fn post_oracle_prices_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Vec<post_oracle_price::Payload>>,
) -> Response {
    if let Err(response) = auth::authorize(&state.verifier, &headers, Role::Admin) {
        return response;
    }
    if payload.len() > MAX_BATCH_SIZE {
        return (
            StatusCode::BAD_REQUEST,
            error(
                "BatchTooLarge",
                format!("at most {MAX_BATCH_SIZE} prices per request"),
            ),
        )
            .into_response();
    }

    let mut entries = Vec::with_capacity(payload.len());
    for entry in &payload {
        let target = match parse_target(entry.token.as_deref()) {
            Ok(target) => target,
            Err(response) => return response,
        };
        let price = match post_oracle_price::parse_price(&entry.price_usd) {
            Ok(price) => price,
            Err(response) => return response,
        };
        entries.push((target, price));
    }

    let mut outcomes = Vec::with_capacity(entries.len());
    for (target, price) in entries {
        let outcome = match state.oracle.set_price(target, &price).await {
            Ok(tx_hash) => Outcome {
                target: target.to_string(),
                tx_hash: Some(format!("{tx_hash:#x}")),
                error: None,
            },
            Err(err) => Outcome {
                target: target.to_string(),
                tx_hash: None,
                error: Some(err.to_string()),
            },
        };
        outcomes.push(outcome);
    }
    Json(outcomes).into_response()
}
