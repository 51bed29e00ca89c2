//! Error types for chatgate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

/// Classification of a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Requested model is not in any enabled provider's catalog
    ModelNotFound,
    /// Resolved provider has no usable credential
    ConfigError,
    /// Provider answered with a non-2xx status
    UpstreamError,
    /// Provider could not be reached (refused, timeout, DNS)
    TransportError,
}

impl FailureKind {
    /// The `type` field of the wire error body.
    pub fn error_type(&self) -> &'static str {
        match self {
            FailureKind::ModelNotFound => "model_not_found",
            FailureKind::ConfigError => "configuration_error",
            FailureKind::UpstreamError | FailureKind::TransportError => "api_error",
        }
    }
}

/// A failed dispatch, carrying everything needed to render the wire body.
#[derive(Debug, Clone)]
pub struct DispatchFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Provider id, when the failure happened after resolution. Used to
    /// derive provider-specific error codes.
    pub provider: Option<String>,
}

impl DispatchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>, provider: Option<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider,
        }
    }

    /// The `code` field of the wire error body.
    ///
    /// Upstream and transport failures use `{provider}_error` with hyphens
    /// mapped to underscores, so "atlas-cloud" yields "atlas_cloud_error".
    pub fn code(&self) -> String {
        match self.kind {
            FailureKind::ModelNotFound => "model_not_found".to_string(),
            FailureKind::ConfigError => "api_key_required".to_string(),
            FailureKind::UpstreamError | FailureKind::TransportError => {
                let provider = self.provider.as_deref().unwrap_or("provider");
                format!("{}_error", provider.replace('-', "_"))
            }
        }
    }

    /// The structured error body returned to HTTP callers.
    pub fn body(&self) -> Value {
        json!({
            "error": {
                "message": self.message,
                "type": self.kind.error_type(),
                "code": self.code(),
            }
        })
    }
}

impl std::fmt::Display for DispatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl IntoResponse for DispatchFailure {
    /// Dispatch failures render as HTTP 200 with the error in the body;
    /// existing web clients key off `body.error`, not the status code.
    fn into_response(self) -> Response {
        (StatusCode::OK, axum::Json(self.body())).into_response()
    }
}
