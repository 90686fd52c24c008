use {
    super::{AppState, error},
    crate::{
        auth::{self, Role},
        scheduler::FULL_SYNC_JOB,
        sync::Entity,
    },
    axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Json, Response},
    },
    serde::Deserialize,
    std::sync::Arc,
};

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct Payload {
    /// Restricts the pass to one collection; the default is a full pass
    /// over everything in dependency order.
    pub entity: Option<Entity>,
}

/// Manually triggers a synchronization pass. The trigger shares the
/// scheduled full sync's run lock, so a pass already in flight finishes
/// before this one starts, and unlike scheduled runs the failure is
/// reported to the caller.
pub(crate) async fn post_sync_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Option<Json<Payload>>,
) -> Response {
    if let Err(response) = auth::authorize(&state.verifier, &headers, Role::Admin) {
        return response;
    }
    let Json(payload) = payload.unwrap_or_default();

    let _guard = match state.scheduler.job(FULL_SYNC_JOB) {
        Some(job) => Some(job.acquire().await),
        None => None,
    };

    let result = match payload.entity {
        Some(entity) => state.engine.sync_entity(entity).await,
        None => state.engine.sync_all().await,
    };
    match result {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            tracing::warn!(?err, "manual sync failed");
            (
                StatusCode::BAD_GATEWAY,
                error("IndexUnavailable", format!("{err:#}")),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_entity_is_optional() {
        let payload: Payload = serde_json::from_str("{}").unwrap();
        assert!(payload.entity.is_none());

        let payload: Payload = serde_json::from_str(r#"{"entity": "menu_items"}"#).unwrap();
        assert_eq!(payload.entity, Some(Entity::MenuItems));

        assert!(serde_json::from_str::<Payload>(r#"{"entity": "everything"}"#).is_err());
    }
}
