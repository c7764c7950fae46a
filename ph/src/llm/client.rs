//! ChatClient trait definition

use async_trait::async_trait;

use super::{ChatRequest, LlmError};

/// Single-shot chat completion: one prompt in, one reply out
///
/// Implementations make exactly one logical call per request (retries aside)
/// and keep no conversation state between calls.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send the prompt and resolve with the assistant's reply text
    async fn chat(&self, request: ChatRequest) -> Result<String, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Mock chat client for unit tests
    pub struct MockChatClient {
        replies: Vec<Result<String, String>>,
        call_count: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl MockChatClient {
        pub fn new(replies: Vec<Result<String, String>>) -> Self {
            debug!(reply_count = %replies.len(), "MockChatClient::new: called");
            Self {
                replies,
                call_count: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Prompts received so far, in call order
        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatClient for MockChatClient {
        async fn chat(&self, request: ChatRequest) -> Result<String, LlmError> {
            debug!("MockChatClient::chat: called");
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(request.prompt.clone());
            }
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.replies.get(idx) {
                Some(Ok(reply)) => Ok(reply.clone()),
                Some(Err(message)) => Err(LlmError::ApiError {
                    status: 500,
                    message: message.clone(),
                }),
                None => Err(LlmError::InvalidResponse("No more mock replies".to_string())),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_client_returns_replies_in_order() {
            let client = MockChatClient::new(vec![Ok("first".to_string()), Err("boom".to_string())]);

            let reply = client.chat(ChatRequest::new("key", "one")).await.unwrap();
            assert_eq!(reply, "first");

            let err = client.chat(ChatRequest::new("key", "two")).await.unwrap_err();
            assert!(err.to_string().contains("boom"));

            assert!(client.chat(ChatRequest::new("key", "three")).await.is_err());
            assert_eq!(client.call_count(), 3);
            assert_eq!(client.prompts(), vec!["one", "two", "three"]);
        }
    }
}
