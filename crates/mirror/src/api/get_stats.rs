use {
    super::{AppState, internal_error_reply},
    axum::{
        extract::State,
        response::{IntoResponse, Json, Response},
    },
    serde::Serialize,
    std::{collections::BTreeMap, sync::Arc},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stats {
    tables: BTreeMap<&'static str, i64>,
    total_rows: i64,
}

pub(crate) async fn get_stats_handler(State(state): State<Arc<AppState>>) -> Response {
    let result: sqlx::Result<_> = async {
        let mut ex = state.db.acquire().await?;
        let mut tables = BTreeMap::new();
        for table in database::TABLES {
            let count = database::table_row_count(&mut ex, table).await?;
            tables.insert(*table, count);
        }
        Ok(tables)
    }
    .await;

    match result {
        Ok(tables) => {
            let total_rows = tables.values().sum();
            Json(Stats { tables, total_rows }).into_response()
        }
        Err(err) => {
            tracing::error!(?err, "get_stats");
            internal_error_reply()
        }
    }
}
