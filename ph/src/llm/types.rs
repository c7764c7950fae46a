//! Request types for chat-completion calls

use std::fmt;

/// One chat-completion request: credential, prompt and optional model
#[derive(Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub api_key: String,
    pub prompt: String,
    /// Overrides the client's default model
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(api_key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            prompt: prompt.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

// Keeps the credential out of logs
impl fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatRequest")
            .field("api_key", &if self.api_key.is_empty() { "<empty>" } else { "<redacted>" })
            .field("prompt_len", &self.prompt.len())
            .field("model", &self.model)
            .finish()
    }
}
