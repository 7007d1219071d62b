use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use crate::backend::{BackendConfig, ImageBackend, Submission};
use crate::error::JobError;

/// Synchronous backend: one call returns the image URL.
pub struct DirectBackend {
    client: Client,
    config: BackendConfig,
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

impl DirectBackend {
    pub fn new(client: Client, config: BackendConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ImageBackend for DirectBackend {
    fn name(&self) -> &str {
        "direct"
    }

    async fn submit(&self, prompt: &str) -> Result<Submission, JobError> {
        let body = json!({
            "model": self.config.model_id,
            "prompt": prompt,
            "size": self.config.size,
            "response_format": "url",
            "watermark": false,
        });

        let resp = self
            .client
            .post(self.config.endpoint("images/generations"))
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| JobError::Submit(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| JobError::Submit(e.to_string()))?;
        if !status.is_success() {
            return Err(JobError::Submit(format!("HTTP {}: {text}", status.as_u16())));
        }

        let parsed: GenerationResponse = serde_json::from_str(&text)
            .map_err(|e| JobError::Submit(format!("malformed generation response: {e}")))?;
        parsed
            .data
            .into_iter()
            .find_map(|img| img.url.filter(|u| !u.is_empty()))
            .map(Submission::Ready)
            .ok_or_else(|| JobError::Submit("no image URL returned from API".into()))
    }
}
