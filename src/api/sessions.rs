use crate::hub::{Hub, MetricsSnapshot};
use crate::session::SessionSummary;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Shared state for the inspection API
pub struct InspectAppState {
    pub hub: Arc<Hub>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create inspection API router
pub fn create_inspect_router(state: Arc<InspectAppState>) -> Router {
    Router::new()
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/logs/read", post(read_logs))
        .route("/api/metrics", get(get_metrics))
        .with_state(state)
}

/// GET /api/sessions - Summaries of all sessions, by client id
async fn list_sessions(State(state): State<Arc<InspectAppState>>) -> Json<Vec<SessionSummary>> {
    let summaries = state
        .hub
        .client_ids()
        .into_iter()
        .filter_map(|id| state.hub.get_session(id))
        .map(|session| session.summary())
        .collect();

    Json(summaries)
}

/// GET /api/sessions/:id - One session
async fn get_session(
    State(state): State<Arc<InspectAppState>>,
    Path(id): Path<u32>,
) -> Result<Json<SessionSummary>, InspectError> {
    let session = state.hub.get_session(id).ok_or(InspectError::NotFound)?;
    Ok(Json(session.summary()))
}

/// POST /api/sessions/:id/logs/read - Logged entity ids by timestamp.
///
/// Clears the session log, like the readLogs operation it exposes.
async fn read_logs(
    State(state): State<Arc<InspectAppState>>,
    Path(id): Path<u32>,
) -> Result<Json<Vec<u32>>, InspectError> {
    let session = state.hub.get_session(id).ok_or(InspectError::NotFound)?;
    Ok(Json(session.read_logs()))
}

/// GET /api/metrics - Hub counters
async fn get_metrics(State(state): State<Arc<InspectAppState>>) -> Json<MetricsSnapshot> {
    Json(state.hub.metrics_snapshot())
}

#[derive(Debug)]
enum InspectError {
    NotFound,
}

impl IntoResponse for InspectError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            InspectError::NotFound => (StatusCode::NOT_FOUND, "Session not found"),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
        });

        (status, body).into_response()
    }
}
