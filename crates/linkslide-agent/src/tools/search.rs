use std::time::Instant;

use async_trait::async_trait;
use linkslide_core::tools::{Tool, ToolContext, ToolError, ToolResult};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, instrument};

use super::SEARCH;

const DEFAULT_COUNT: u64 = 5;

/// Looks up current information from a configured HTTP search endpoint.
pub struct SearchTool {
    client: Client,
    url: String,
    api_key: Option<SecretString>,
}

impl SearchTool {
    pub fn new(client: Client, url: impl Into<String>, api_key: Option<SecretString>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date information on the topic"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            }
        })
    }

    #[instrument(skip_all, fields(session_id = %ctx.session.id))]
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let start = Instant::now();

        let query = args["query"]
            .as_str()
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("query is required".into()))?;
        debug!(query, "searching");

        let count = DEFAULT_COUNT.to_string();
        let mut request = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .query(&[("q", query), ("count", count.as_str())]);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let mut result = ToolResult::error(format!("Search failed: HTTP {status}: {body}"));
            result.duration = start.elapsed();
            return Ok(result);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to parse response: {e}")))?;

        let mut result = ToolResult::ok(format_search_results(&body));
        result.duration = start.elapsed();
        Ok(result)
    }
}

/// Accepts both `{web: {results}}` and a flat `{results}` payload.
fn format_search_results(body: &Value) -> String {
    let results = body["web"]["results"]
        .as_array()
        .or_else(|| body["results"].as_array());

    let mut output = String::new();
    for (i, result) in results.into_iter().flatten().enumerate() {
        let title = result["title"].as_str().unwrap_or("(untitled)");
        let url = result["url"].as_str().unwrap_or("");
        let description = result["description"]
            .as_str()
            .or_else(|| result["snippet"].as_str())
            .unwrap_or("");

        output.push_str(&format!("{}. [{}]({})\n", i + 1, title, url));
        if !description.is_empty() {
            output.push_str(&format!("   {description}\n"));
        }
        output.push('\n');
    }

    if output.is_empty() {
        output = "No search results found.".to_string();
    }
    output
}
