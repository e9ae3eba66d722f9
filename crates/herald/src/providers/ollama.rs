use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::base::{Provider, Usage};
use super::configs::OllamaProviderConfig;
use super::utils::{build_chat_payload, get_openai_usage, openai_response_to_message};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub const OLLAMA_HOST: &str = "http://localhost:11434";
pub const OLLAMA_MODEL: &str = "qwen2.5";

/// Talks to a local Ollama through its OpenAI compatible endpoint
pub struct OllamaProvider {
    client: Client,
    config: OllamaProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: OllamaProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self.client.post(&url).json(&payload).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
                Err(anyhow!("Server error: {}", status))
            }
            status => Err(anyhow!("Request failed: {}", status)),
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let payload = build_chat_payload(
            &self.config.model,
            system,
            messages,
            tools,
            self.config.temperature,
            self.config.max_tokens,
        )?;
        debug!(model = %self.config.model, messages = messages.len(), "ollama completion");

        let response = self.post(payload).await?;

        let message = openai_response_to_message(&response)?;
        // Older Ollama builds omit usage entirely
        let usage = get_openai_usage(&response).unwrap_or_default();

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> OllamaProviderConfig {
        OllamaProviderConfig {
            host: server.uri(),
            model: OLLAMA_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn test_complete_tool_request() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_h5d3s25w",
                            "type": "function",
                            "function": {
                                "name": "search__web_search",
                                "arguments": "{\"query\":\"vegan meal kits 2025\"}"
                            }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {
                    "prompt_tokens": 63,
                    "completion_tokens": 70,
                    "total_tokens": 133
                }
            })))
            .mount(&mock_server)
            .await;

        let provider = OllamaProvider::new(config_for(&mock_server))?;
        let tool = Tool::new(
            "search__web_search",
            "Search the web",
            json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        );
        let (message, usage) = provider
            .complete(
                "You are a researcher.",
                &[Message::user().with_text("Research vegan meal kits")],
                &[tool],
            )
            .await?;

        let request = message.content[0].as_tool_request().unwrap();
        let tool_call = request.tool_call.as_ref().unwrap();
        assert_eq!(tool_call.name, "search__web_search");
        assert_eq!(tool_call.arguments, json!({"query": "vegan meal kits 2025"}));
        assert_eq!(usage.total_tokens, Some(133));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_usage_is_tolerated() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "ok"}}]
            })))
            .mount(&mock_server)
            .await;

        let provider = OllamaProvider::new(config_for(&mock_server))?;
        let (message, usage) = provider
            .complete("system", &[Message::user().with_text("Hi")], &[])
            .await?;
        assert_eq!(message.text(), "ok");
        assert_eq!(usage, Usage::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let provider = OllamaProvider::new(config_for(&mock_server))?;
        let result = provider
            .complete("system", &[Message::user().with_text("Hello?")], &[])
            .await;

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Server error: 500"));
        Ok(())
    }
}
