use serde::{Deserialize, Serialize};

use super::message::Message;

/// Body of a `POST /v1/messages` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

impl MessagesRequest {
    /// Creates a new `MessagesRequest`.
    ///
    /// # Arguments
    ///
    /// * `model` - Model identifier sent to the API.
    /// * `max_tokens` - Output token cap.
    /// * `messages` - The conversation, usually a single user turn.
    pub fn new(model: String, max_tokens: u32, messages: Vec<Message>) -> Self {
        Self {
            model,
            max_tokens,
            messages,
        }
    }
}
