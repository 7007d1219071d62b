use std::sync::Arc;

use async_trait::async_trait;
use linkslide_core::QualityMode;
use secrecy::SecretString;

use crate::error::JobError;

/// Connection settings shared by the HTTP backends.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub model_id: String,
    /// `WIDTHxHEIGHT`.
    pub size: String,
}

impl BackendConfig {
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// What a backend returns from a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    /// The image is ready at this URL.
    Ready(String),
    /// The job was queued; poll with this id.
    Pending(String),
}

/// Status reported by one poll of an asynchronous job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded { image_url: String },
    Failed { message: String },
}

/// An image-generation service.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn submit(&self, prompt: &str) -> Result<Submission, JobError>;

    async fn poll(&self, job_id: &str) -> Result<JobStatus, JobError> {
        Err(JobError::JobFailed(format!(
            "{} does not support polling (job {job_id})",
            self.name()
        )))
    }
}

/// The two backends a session can use, keyed by quality mode.
#[derive(Clone)]
pub struct ImageBackends {
    standard: Arc<dyn ImageBackend>,
    pro: Arc<dyn ImageBackend>,
}

impl ImageBackends {
    pub fn new(standard: Arc<dyn ImageBackend>, pro: Arc<dyn ImageBackend>) -> Self {
        Self { standard, pro }
    }

    pub fn select(&self, mode: QualityMode) -> Arc<dyn ImageBackend> {
        match mode {
            QualityMode::Standard => self.standard.clone(),
            QualityMode::Pro => self.pro.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl ImageBackend for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn submit(&self, _prompt: &str) -> Result<Submission, JobError> {
            Ok(Submission::Ready(format!("https://img/{}", self.0)))
        }
    }

    #[test]
    fn select_by_mode() {
        let backends = ImageBackends::new(Arc::new(Named("polling")), Arc::new(Named("direct")));
        assert_eq!(backends.select(QualityMode::Standard).name(), "polling");
        assert_eq!(backends.select(QualityMode::Pro).name(), "direct");
    }

    #[tokio::test]
    async fn poll_defaults_to_failure() {
        let err = Named("direct").poll("t1").await.unwrap_err();
        assert!(matches!(err, JobError::JobFailed(_)));
    }

    #[test]
    fn endpoint_joins_cleanly() {
        let cfg = BackendConfig {
            base_url: "https://api.example.com/".into(),
            api_key: SecretString::from("k"),
            model_id: "m".into(),
            size: "1600x900".into(),
        };
        assert_eq!(
            cfg.endpoint("v1/images/generations"),
            "https://api.example.com/v1/images/generations"
        );
        assert_eq!(cfg.endpoint("/v1/tasks/1"), "https://api.example.com/v1/tasks/1");
    }
}
