//! Test-only mock LLM provider.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

/// Replays queued responses and records every conversation it receives.
#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    recorded: Arc<Mutex<Vec<Vec<Message>>>>,
    pub default_response: String,
    pub fail_chat: bool,
    /// Milliseconds to sleep before returning a response.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            recorded: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            fail_chat: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Conversations passed to `chat`, oldest first.
    #[must_use]
    pub fn recorded(&self) -> Vec<Vec<Message>> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail_chat {
            return Err(LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}
