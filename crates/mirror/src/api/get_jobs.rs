use {
    super::AppState,
    crate::scheduler::JobStatus,
    axum::{
        extract::State,
        response::{IntoResponse, Json, Response},
    },
    serde::Serialize,
    std::sync::Arc,
};

#[derive(Serialize)]
struct JobView {
    name: &'static str,
    #[serde(flatten)]
    status: JobStatus,
}

pub(crate) async fn get_jobs_handler(State(state): State<Arc<AppState>>) -> Response {
    let jobs: Vec<_> = state
        .scheduler
        .statuses()
        .into_iter()
        .map(|(name, status)| JobView { name, status })
        .collect();
    Json(jobs).into_response()
}
