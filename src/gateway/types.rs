//! Chat completion request types.

use serde::{Deserialize, Serialize};

/// Chat completion request body.
///
/// `chat_id` and `id` are correlation ids carried through to the completion
/// event broadcast; the upstream provider never sees them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    // f64, not f32: an f32 0.7 widens to 0.699999988... when serialized
    // into the upstream JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A chat message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}
