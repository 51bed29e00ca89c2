//! HTTP request handlers.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};

use super::dispatch::CompletionResult;
use super::server::AppState;
use super::types::CompletionRequest;

/// Handle POST /api/chat/completions.
///
/// Always answers 200; failures are reported in the body so legacy web
/// clients can key off `body.error`.
pub async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<CompletionRequest>,
) -> Response {
    tracing::info!(
        model = %request.model,
        messages = request.messages.len(),
        "Received chat completion request"
    );

    match state.dispatcher.dispatch(&request).await {
        CompletionResult::Success { payload, task_id, .. } => {
            tracing::info!(model = %request.model, task_id = %task_id, "Completion succeeded");
            Json(payload).into_response()
        }
        CompletionResult::Failure(failure) => {
            tracing::warn!(
                model = %request.model,
                code = %failure.code(),
                error = %failure.message,
                "Completion failed"
            );
            failure.into_response()
        }
    }
}

/// Handle GET /api/models - catalog of models across enabled providers.
pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    let models: Vec<serde_json::Value> = state
        .registry
        .available_models()
        .iter()
        .map(|model| {
            let owned_by = state
                .registry
                .resolve(model)
                .map(|provider| provider.name.clone())
                .unwrap_or_default();
            serde_json::json!({
                "id": model,
                "object": "model",
                "owned_by": owned_by,
            })
        })
        .collect();

    Json(serde_json::json!({ "data": models }))
}

/// Handle GET /health.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": true }))
}
