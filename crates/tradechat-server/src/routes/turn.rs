use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tradechat::assistant::TurnRequest;

/// Session used when the caller sends no account
const ANONYMOUS_SESSION: &str = "default";

#[derive(Debug, Deserialize, Serialize)]
struct ProcessDataRequest {
    user_query: String,
    #[serde(default)]
    account_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

async fn process_data(
    State(state): State<AppState>,
    Json(request): Json<ProcessDataRequest>,
) -> Response {
    let account_id = request
        .account_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    let turn = TurnRequest {
        message: request.user_query,
        session_id: account_id
            .clone()
            .unwrap_or_else(|| ANONYMOUS_SESSION.to_string()),
        account_id,
    };

    match state.assistant.handle_turn(turn).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: err.to_string(),
                kind: err.kind(),
            }),
        )
            .into_response(),
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/process_data", post(process_data))
        .with_state(state)
}
