use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info};

use super::System;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

pub const SEARCH_HOST: &str = "https://api.tavily.com";
pub const SEARCH_MAX_RESULTS: u32 = 5;

const RESULT_SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: String,
    pub host: String,
    pub max_results: u32,
}

impl SearchConfig {
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            host: SEARCH_HOST.to_string(),
            max_results: SEARCH_MAX_RESULTS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    url: String,
    content: String,
}

/// Real-time web search backed by the Tavily search API
pub struct SearchSystem {
    client: Client,
    config: SearchConfig,
    tools: Vec<Tool>,
}

impl SearchSystem {
    pub fn new(config: SearchConfig) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AgentError::Internal(e.to_string()))?;

        let web_search = Tool::new(
            "web_search",
            "Use this tool to perform real-time web searches for information. Focus your query on marketing trends, competitor analysis, and relevant keywords.",
            json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                }
            }),
        );

        Ok(Self {
            client,
            config,
            tools: vec![web_search],
        })
    }

    async fn search(&self, query: &str) -> anyhow::Result<String> {
        let url = format!("{}/search", self.config.host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "api_key": self.config.api_key,
                "query": query,
                "max_results": self.config.max_results,
                "topic": "general",
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: SearchResponse = response.json().await?;
        Ok(format_results(&body.results))
    }

    async fn web_search(&self, tool_call: &ToolCall) -> AgentResult<Vec<Content>> {
        let query = tool_call
            .arguments
            .get("query")
            .and_then(|q| q.as_str())
            .ok_or_else(|| AgentError::InvalidParameters("The query string is required".into()))?;

        info!(query, "executing web search");
        match self.search(query).await {
            Ok(formatted) => {
                info!(
                    preview = %formatted.chars().take(500).collect::<String>(),
                    "search results"
                );
                Ok(vec![Content::text(formatted)])
            }
            Err(e) => {
                error!(error = %e, "web search failed");
                Err(AgentError::ExecutionError(format!("Search failed: {}", e)))
            }
        }
    }
}

fn format_results(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("Source: {}\nContent: {}", r.url, r.content))
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}

#[async_trait]
impl System for SearchSystem {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Real-time web search for market research."
    }

    fn instructions(&self) -> &str {
        "Call web_search with a focused query. Each result comes back as a source URL followed \
         by its content; cite the sources you use in your summary."
    }

    fn tools(&self) -> &[Tool] {
        &self.tools
    }

    async fn call(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        match tool_call.name.as_str() {
            "web_search" => self.web_search(&tool_call).await,
            _ => Err(AgentError::ToolNotFound(tool_call.name)),
        }
    }
}
