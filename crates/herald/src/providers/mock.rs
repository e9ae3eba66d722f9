use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, Usage};

/// A provider that replays pre-configured responses, for tests and offline runs
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
    failure: Option<String>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            failure: None,
        }
    }

    /// A provider whose every completion fails with `message`
    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system_prompt: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        if let Some(failure) = &self.failure {
            return Err(anyhow!("{}", failure));
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| anyhow!("mock provider lock poisoned"))?;
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Ok((Message::assistant().with_text(""), Usage::default()))
        } else {
            Ok((responses.remove(0), Usage::default()))
        }
    }
}
