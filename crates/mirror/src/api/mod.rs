use {
    crate::{auth, scheduler::Scheduler, sync::SyncEngine},
    axum::{
        Router,
        extract::{ConnectInfo, DefaultBodyLimit, Request, State},
        http::StatusCode,
        middleware::{self, Next},
        response::{IntoResponse, Json, Response},
    },
    database::pagination::{self, Page},
    oracle::OracleService,
    serde::{Deserialize, Serialize},
    sqlx::PgPool,
    std::{borrow::Cow, net::SocketAddr, sync::Arc, time::Instant},
    tower_http::{cors::CorsLayer, trace::TraceLayer},
};

mod get_customers;
mod get_jobs;
mod get_menu_items;
mod get_oracle_price;
mod get_orders;
mod get_price_updates;
mod get_restaurants;
mod get_settlements;
mod get_stats;
mod post_oracle_price;
mod post_oracle_prices;
mod post_sync;

/// Centralized application state shared across all API handlers.
pub struct AppState {
    pub db: PgPool,
    pub engine: Arc<SyncEngine>,
    pub scheduler: Arc<Scheduler>,
    pub oracle: Arc<OracleService>,
    pub rate_limiter: Arc<rate_limit::RateLimiter>,
    pub verifier: auth::Verifier,
}

const MAX_JSON_BODY_PAYLOAD: u64 = 1024 * 16;

pub fn handle_all_routes(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(
            "/v1/customers",
            axum::routing::get(get_customers::get_customers_handler),
        )
        .route(
            "/v1/restaurants",
            axum::routing::get(get_restaurants::get_restaurants_handler),
        )
        .route(
            "/v1/menu_items",
            axum::routing::get(get_menu_items::get_menu_items_handler),
        )
        .route(
            "/v1/orders",
            axum::routing::get(get_orders::get_orders_handler),
        )
        .route(
            "/v1/price_updates",
            axum::routing::get(get_price_updates::get_price_updates_handler),
        )
        .route(
            "/v1/payments",
            axum::routing::get(get_settlements::get_payments_handler),
        )
        .route(
            "/v1/refunds",
            axum::routing::get(get_settlements::get_refunds_handler),
        )
        .route(
            "/v1/stats",
            axum::routing::get(get_stats::get_stats_handler),
        )
        .route("/v1/jobs", axum::routing::get(get_jobs::get_jobs_handler))
        .route("/v1/sync", axum::routing::post(post_sync::post_sync_handler))
        .route(
            "/v1/oracle/price",
            axum::routing::get(get_oracle_price::get_oracle_price_handler)
                .post(post_oracle_price::post_oracle_price_handler),
        )
        .route(
            "/v1/oracle/prices",
            axum::routing::post(post_oracle_prices::post_oracle_prices_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(with_matched_path_metric))
        .with_state(state);

    finalize_router(api_router)
}

/// Keys API callers by the first `x-forwarded-for` hop, falling back to
/// the peer address, and rejects callers that exhausted their window.
async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let caller = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string());

    match state.rate_limiter.check(&caller) {
        Ok(()) => next.run(request).await,
        Err(rate_limit::Error::RateLimited { retry_after }) => (
            StatusCode::TOO_MANY_REQUESTS,
            [(
                axum::http::header::RETRY_AFTER,
                retry_after.as_secs().max(1).to_string(),
            )],
            error("RateLimited", "too many requests, slow down"),
        )
            .into_response(),
    }
}

/// Middleware that automatically tracks metrics using Axum's MatchedPath.
async fn with_matched_path_metric(request: Request, next: Next) -> Response {
    let metrics = ApiMetrics::instance(observe::metrics::get_storage_registry()).unwrap();

    let method = request.method().as_str();
    let matched_path = request
        .extensions()
        .get::<axum::extract::MatchedPath>()
        .map(|path| path.as_str())
        .unwrap_or("unknown");
    let label = format!("{method} {matched_path}");

    let timer = Instant::now();
    let response = next.run(request).await;
    let status = response.status();

    metrics
        .requests_complete
        .with_label_values(&[&label, status.as_str()])
        .inc();
    metrics
        .requests_duration_seconds
        .with_label_values(&[&label])
        .observe(timer.elapsed().as_secs_f64());

    response
}

#[derive(prometheus_metric_storage::MetricStorage, Clone, Debug)]
#[metric(subsystem = "api")]
struct ApiMetrics {
    /// Number of completed API requests.
    #[metric(labels("method", "status_code"))]
    requests_complete: prometheus::IntCounterVec,

    /// Execution time for each API request.
    #[metric(labels("method"), buckets(0.1, 0.5, 1, 2, 4, 6, 8, 10))]
    requests_duration_seconds: prometheus::HistogramVec,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    pub error_type: Cow<'static, str>,
    pub description: Cow<'static, str>,
}

pub fn error(error_type: &'static str, description: impl AsRef<str>) -> Json<Error> {
    Json(Error {
        error_type: error_type.into(),
        description: Cow::Owned(description.as_ref().to_owned()),
    })
}

pub fn internal_error_reply() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error("InternalServerError", ""),
    )
        .into_response()
}

/// Maps oracle failures to the API error taxonomy: rejected inputs are
/// the caller's fault, everything involving the ledger is an upstream
/// failure.
pub(crate) fn oracle_error_reply(err: oracle::OracleError) -> Response {
    use oracle::OracleError;
    match err {
        OracleError::PriceOutOfBounds { .. } => {
            (StatusCode::BAD_REQUEST, error("PriceOutOfBounds", err.to_string())).into_response()
        }
        OracleError::Scale(_) => {
            (StatusCode::BAD_REQUEST, error("InvalidPrice", err.to_string())).into_response()
        }
        OracleError::MissingRole(_) => (
            StatusCode::BAD_GATEWAY,
            error("MissingWriterRole", err.to_string()),
        )
            .into_response(),
        OracleError::SourcesDisagree => (
            StatusCode::BAD_GATEWAY,
            error("SourcesDisagree", err.to_string()),
        )
            .into_response(),
        OracleError::Timeout(_) | OracleError::Rpc(_) => {
            tracing::warn!(?err, "oracle interaction failed");
            (
                StatusCode::BAD_GATEWAY,
                error("OracleUnavailable", err.to_string()),
            )
                .into_response()
        }
    }
}

/// Parses a `0x`-prefixed or bare hex address query parameter.
pub(crate) fn parse_address(value: &str) -> Result<database::Address, Response> {
    database::Address::from_hex(value).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            error("InvalidAddress", format!("{value} is not a valid address")),
        )
            .into_response()
    })
}

/// Pagination query parameters shared by every listing endpoint.
#[derive(Clone, Copy, Debug, Deserialize)]
pub(crate) struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub(crate) fn validate(&self) -> Result<Page, Response> {
        Page::new(
            self.page.unwrap_or(1),
            self.limit.unwrap_or(pagination::DEFAULT_LIMIT),
        )
        .map_err(|err| {
            (StatusCode::BAD_REQUEST, error("InvalidPagination", err.to_string())).into_response()
        })
    }
}

/// One page of results with the metadata every listing endpoint returns.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Paginated<T> {
    pub(crate) fn new<U>(
        data: Vec<U>,
        total: i64,
        page: &Page,
        map: impl FnMut(U) -> T,
    ) -> Json<Self> {
        let paginated = pagination::Paginated::new(data, total, page).map(map);
        Json(Self {
            data: paginated.data,
            total: paginated.total,
            page: paginated.page,
            limit: paginated.limit,
            total_pages: paginated.total_pages,
            has_next: paginated.has_next,
            has_prev: paginated.has_prev,
        })
    }
}

/// Sets up cors and log tracing for all routes, nesting the versioned
/// routes under /api.
fn finalize_router(api_router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(vec![
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(vec![
            axum::http::header::ORIGIN,
            axum::http::header::CONTENT_TYPE,
            // Must be lower case due to the HTTP-2 spec
            axum::http::HeaderName::from_static("x-auth-token"),
        ]);

    Router::new()
        .nest("/api", api_router)
        .route("/liveness", axum::routing::get(|| async { StatusCode::OK }))
        .layer(DefaultBodyLimit::max(MAX_JSON_BODY_PAYLOAD as usize))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn errors_serialize_camel_case() {
        assert_eq!(
            serde_json::to_value(Error {
                error_type: "foo".into(),
                description: "bar".into(),
            })
            .unwrap(),
            json!({
                "errorType": "foo",
                "description": "bar",
            }),
        );
    }

    #[test]
    fn page_query_validation() {
        let query = PageQuery {
            page: None,
            limit: None,
        };
        let page = query.validate().unwrap();
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), pagination::DEFAULT_LIMIT);

        let query = PageQuery {
            page: Some(0),
            limit: None,
        };
        assert!(query.validate().is_err());

        let query = PageQuery {
            page: Some(1),
            limit: Some(1000),
        };
        assert_eq!(query.validate().unwrap().limit(), pagination::MAX_LIMIT);
    }
}
