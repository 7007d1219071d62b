use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::backend::{BackendConfig, ImageBackend, JobStatus, Submission};
use crate::error::JobError;

const ASYNC_MODE_HEADER: &str = "X-ModelScope-Async-Mode";
const TASK_TYPE_HEADER: &str = "X-ModelScope-Task-Type";

/// Asynchronous backend: submit returns a task id which is then polled.
pub struct PollingBackend {
    client: Client,
    config: BackendConfig,
}

#[derive(Deserialize)]
struct SubmitResponse {
    task_id: String,
}

#[derive(Deserialize)]
struct TaskResponse {
    #[serde(default)]
    task_status: String,
    #[serde(default)]
    output_images: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

impl PollingBackend {
    pub fn new(client: Client, config: BackendConfig) -> Self {
        Self { client, config }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.config.api_key.expose_secret())
    }
}

#[async_trait]
impl ImageBackend for PollingBackend {
    fn name(&self) -> &str {
        "polling"
    }

    async fn submit(&self, prompt: &str) -> Result<Submission, JobError> {
        let body = json!({
            "model": self.config.model_id,
            "prompt": prompt,
            "size": self.config.size,
        });

        let resp = self
            .client
            .post(self.config.endpoint("v1/images/generations"))
            .header("Authorization", self.bearer())
            .header(ASYNC_MODE_HEADER, "true")
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

        let parsed: SubmitResponse = serde_json::from_str(&text)
            .map_err(|e| JobError::Submit(format!("malformed submit response: {e}")))?;
        debug!(task_id = %parsed.task_id, "image task submitted");
        Ok(Submission::Pending(parsed.task_id))
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus, JobError> {
        let resp = self
            .client
            .get(self.config.endpoint(&format!("v1/tasks/{job_id}")))
            .header("Authorization", self.bearer())
            .header(ASYNC_MODE_HEADER, "true")
            .header(TASK_TYPE_HEADER, "image_generation")
            .send()
            .await
            .map_err(|e| JobError::PollTransient(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(JobError::PollTransient(format!("poll status {}", status.as_u16())));
        }

        let task: TaskResponse = resp
            .json()
            .await
            .map_err(|e| JobError::PollTransient(format!("malformed poll response: {e}")))?;

        match task.task_status.as_str() {
            "SUCCEED" => match task.output_images.into_iter().next() {
                Some(image_url) => Ok(JobStatus::Succeeded { image_url }),
                None => Err(JobError::ArtifactFetch(
                    "task succeeded without output images".into(),
                )),
            },
            "FAILED" => Ok(JobStatus::Failed {
                message: task.message.unwrap_or_else(|| "Unknown error".into()),
            }),
            _ => Ok(JobStatus::Pending),
        }
    }
}
