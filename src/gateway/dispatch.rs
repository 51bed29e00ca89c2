//! Completion dispatch: model resolution, upstream call, event broadcast.

use std::sync::Arc;

use axum::http::header;
use reqwest::Client;
use serde_json::{json, Value};

use super::types::CompletionRequest;
use crate::error::{DispatchFailure, FailureKind};
use crate::registry::{ModelRegistry, ProviderDescriptor};
use crate::ws::{ChatCompletionEvent, EventHub, SHARED_CHAT_ROOM};

/// Applied when the caller does not set `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Applied when the caller does not set `temperature`.
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Event name completion notifications are published under.
const CHAT_EVENTS: &str = "chat-events";

/// Outcome of one dispatch.
#[derive(Debug)]
pub enum CompletionResult {
    Success {
        /// First choice's message content; empty on unexpected payload shape
        content: String,
        /// Raw upstream payload with `task_id` merged in
        payload: Value,
        task_id: String,
    },
    Failure(DispatchFailure),
}

/// Routes one completion request to its provider and broadcasts the result.
///
/// Dispatches are independent; the only shared state is the read-only
/// registry and the event hub. Exactly one upstream attempt is made per
/// dispatch, with no retries.
pub struct Dispatcher {
    registry: Arc<ModelRegistry>,
    http_client: Client,
    hub: Arc<EventHub>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ModelRegistry>, http_client: Client, hub: Arc<EventHub>) -> Self {
        Self {
            registry,
            http_client,
            hub,
        }
    }

    /// Resolve, forward, and broadcast one completion request.
    ///
    /// Every failure mode is recovered into a [`CompletionResult::Failure`];
    /// this function does not return `Err` and does not panic on malformed
    /// upstream payloads.
    pub async fn dispatch(&self, request: &CompletionRequest) -> CompletionResult {
        let provider = match self.registry.resolve(&request.model) {
            Some(provider) => provider.clone(),
            None => {
                return CompletionResult::Failure(DispatchFailure::new(
                    FailureKind::ModelNotFound,
                    format!(
                        "Model '{}' not found. Available models: {}",
                        request.model,
                        self.registry.available_models().join(", ")
                    ),
                    None,
                ));
            }
        };

        let Some(api_key) = provider.api_key.as_ref() else {
            return CompletionResult::Failure(DispatchFailure::new(
                FailureKind::ConfigError,
                format!(
                    "API key not configured for provider '{}'. Set the {} environment variable.",
                    provider.name, provider.key_env_var
                ),
                Some(provider.name.clone()),
            ));
        };

        let upstream_url = format!("{}/chat/completions", provider.base_url);
        let body = json!({
            "model": request.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        });

        tracing::info!(
            model = %request.model,
            provider = %provider.name,
            url = %upstream_url,
            "Forwarding completion request"
        );

        let upstream_response = match self
            .http_client
            .post(&upstream_url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(provider = %provider.name, error = %e, "Failed to reach provider");
                return CompletionResult::Failure(DispatchFailure::new(
                    FailureKind::TransportError,
                    format!("Failed to reach provider '{}': {}", provider.name, e),
                    Some(provider.name.clone()),
                ));
            }
        };

        let status = upstream_response.status();
        if !status.is_success() {
            let error_body = upstream_response.text().await.unwrap_or_default();
            tracing::error!(
                provider = %provider.name,
                status = %status,
                body = %error_body,
                "Provider returned error"
            );
            return CompletionResult::Failure(DispatchFailure::new(
                FailureKind::UpstreamError,
                format!(
                    "Provider '{}' returned {}: {}",
                    provider.name, status, error_body
                ),
                Some(provider.name.clone()),
            ));
        }

        let mut payload: Value = match upstream_response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(provider = %provider.name, error = %e, "Failed to parse provider response");
                return CompletionResult::Failure(DispatchFailure::new(
                    FailureKind::UpstreamError,
                    format!(
                        "Failed to parse response from '{}': {}",
                        provider.name, e
                    ),
                    Some(provider.name.clone()),
                ));
            }
        };

        let content = extract_content(&payload);
        let task_id = format!("task_{}", chrono::Utc::now().timestamp());

        if let Some(obj) = payload.as_object_mut() {
            obj.insert("task_id".to_string(), Value::String(task_id.clone()));
        }

        self.broadcast_completion(request, &provider, &content);

        CompletionResult::Success {
            content,
            payload,
            task_id,
        }
    }

    /// Best-effort completion broadcast to the shared chat room.
    ///
    /// Failures here are logged and swallowed; the HTTP caller still gets its
    /// response.
    fn broadcast_completion(
        &self,
        request: &CompletionRequest,
        provider: &ProviderDescriptor,
        content: &str,
    ) {
        let event = ChatCompletionEvent::completed(
            request.chat_id.as_deref(),
            request.message_id.as_deref(),
            content.to_string(),
            format!("Chat with {}", request.model),
        );
        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize completion event");
                return;
            }
        };

        let delivered = self.hub.publish(SHARED_CHAT_ROOM, CHAT_EVENTS, payload);
        tracing::debug!(
            provider = %provider.name,
            model = %request.model,
            delivered,
            "Broadcast completion event"
        );
    }
}

/// Extract the first choice's message content from an upstream payload.
///
/// An unexpected shape yields an empty string, never an error.
fn extract_content(payload: &Value) -> String {
    payload
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())
        .unwrap_or_default()
        .to_string()
}
