//! Retrying image-job runner.
//!
//! One attempt is `submit → (poll)* → fetch`. Attempts are retried with a
//! fixed cooldown until `max_attempts` is reached; the runner itself never
//! returns an error, only a [`JobOutcome`].

use std::sync::Arc;
use std::time::Duration;

use linkslide_core::slides::FAILURE_PREFIX;
use linkslide_core::SessionId;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::artifact::ArtifactFetcher;
use crate::backend::{ImageBackend, JobStatus, Submission};
use crate::error::JobError;

/// Retry, polling and timeout constants for image jobs.
#[derive(Clone, Debug)]
pub struct JobPolicy {
    pub max_attempts: u32,
    pub cooldown: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub submit_timeout: Duration,
    pub poll_timeout: Duration,
    pub fetch_timeout: Duration,
}

impl Default for JobPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            cooldown: Duration::from_secs(3),
            poll_interval: Duration::from_secs(2),
            max_polls: 45,
            submit_timeout: Duration::from_secs(30),
            poll_timeout: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl JobPolicy {
    /// Upper bound on one [`JobRunner::run`]: every attempt exhausting its
    /// submit, poll and fetch timeouts, plus the cooldowns between attempts.
    pub fn max_duration(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        let per_poll = self.poll_interval + self.poll_timeout;
        let per_attempt = self.submit_timeout + per_poll * self.max_polls + self.fetch_timeout;
        per_attempt * attempts + self.cooldown * (attempts - 1)
    }
}

/// One slide image to generate.
#[derive(Clone, Debug)]
pub struct SlideJob {
    pub prompt: String,
    pub slide_index: u32,
    pub session_id: SessionId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptStatus {
    Succeeded,
    Failed,
    TimedOut,
}

/// Record of one attempt, kept for logging and tests.
#[derive(Clone, Debug)]
pub struct JobAttempt {
    pub index: u32,
    pub job_id: Option<String>,
    pub status: AttemptStatus,
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub enum JobOutcome {
    Succeeded {
        image_ref: String,
        attempts: Vec<JobAttempt>,
    },
    Failed {
        reason: String,
        attempts: Vec<JobAttempt>,
    },
}

impl JobOutcome {
    /// Public image reference, or the `Error: …` string recorded for a failed slide.
    pub fn image_ref(&self) -> String {
        match self {
            Self::Succeeded { image_ref, .. } => image_ref.clone(),
            Self::Failed { reason, attempts } => format!(
                "{FAILURE_PREFIX} All {} attempts failed. Reason: {reason}",
                attempts.len()
            ),
        }
    }

    pub fn attempts(&self) -> &[JobAttempt] {
        match self {
            Self::Succeeded { attempts, .. } | Self::Failed { attempts, .. } => attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

pub struct JobRunner {
    policy: JobPolicy,
    fetcher: Arc<dyn ArtifactFetcher>,
}

impl JobRunner {
    pub fn new(policy: JobPolicy, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        Self { policy, fetcher }
    }

    pub fn policy(&self) -> &JobPolicy {
        &self.policy
    }

    pub async fn run(&self, backend: &dyn ImageBackend, job: &SlideJob) -> JobOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = Vec::with_capacity(max_attempts as usize);

        for index in 1..=max_attempts {
            debug!(
                session_id = %job.session_id,
                slide_index = job.slide_index,
                backend = backend.name(),
                attempt = index,
                max_attempts,
                "submitting image job"
            );

            let mut job_id = None;
            match self.attempt(backend, job, &mut job_id).await {
                Ok(image_ref) => {
                    info!(
                        session_id = %job.session_id,
                        slide_index = job.slide_index,
                        attempt = index,
                        image_ref = %image_ref,
                        "slide image ready"
                    );
                    attempts.push(JobAttempt {
                        index,
                        job_id,
                        status: AttemptStatus::Succeeded,
                        error: None,
                    });
                    return JobOutcome::Succeeded {
                        image_ref,
                        attempts,
                    };
                }
                Err(e) => {
                    warn!(
                        session_id = %job.session_id,
                        slide_index = job.slide_index,
                        attempt = index,
                        max_attempts,
                        error_kind = e.error_kind(),
                        error = %e,
                        "image attempt failed"
                    );
                    let status = match e {
                        JobError::JobTimeout { .. } => AttemptStatus::TimedOut,
                        _ => AttemptStatus::Failed,
                    };
                    attempts.push(JobAttempt {
                        index,
                        job_id,
                        status,
                        error: Some(e.to_string()),
                    });
                    if index < max_attempts {
                        sleep(self.policy.cooldown).await;
                    }
                }
            }
        }

        let reason = attempts
            .last()
            .and_then(|a| a.error.clone())
            .unwrap_or_else(|| "unknown failure".into());
        JobOutcome::Failed { reason, attempts }
    }

    async fn attempt(
        &self,
        backend: &dyn ImageBackend,
        job: &SlideJob,
        job_id: &mut Option<String>,
    ) -> Result<String, JobError> {
        let submission = timeout(self.policy.submit_timeout, backend.submit(&job.prompt))
            .await
            .map_err(|_| {
                JobError::Submit(format!("timed out after {:?}", self.policy.submit_timeout))
            })??;

        let image_url = match submission {
            Submission::Ready(url) => url,
            Submission::Pending(id) => {
                *job_id = Some(id.clone());
                self.await_job(backend, &id).await?
            }
        };

        timeout(
            self.policy.fetch_timeout,
            self.fetcher.fetch(&image_url, &job.session_id, job.slide_index),
        )
        .await
        .map_err(|_| {
            JobError::ArtifactFetch(format!("timed out after {:?}", self.policy.fetch_timeout))
        })?
    }

    async fn await_job(&self, backend: &dyn ImageBackend, job_id: &str) -> Result<String, JobError> {
        for poll in 1..=self.policy.max_polls {
            sleep(self.policy.poll_interval).await;
            match timeout(self.policy.poll_timeout, backend.poll(job_id)).await {
                Err(_) => debug!(job_id, poll, "poll request timed out, retrying"),
                Ok(Err(JobError::PollTransient(reason))) => {
                    debug!(job_id, poll, %reason, "transient poll error, retrying")
                }
                Ok(Err(e)) => return Err(e),
                Ok(Ok(JobStatus::Pending)) => {}
                Ok(Ok(JobStatus::Succeeded { image_url })) => return Ok(image_url),
                Ok(Ok(JobStatus::Failed { message })) => return Err(JobError::JobFailed(message)),
            }
        }
        Err(JobError::JobTimeout {
            polls: self.policy.max_polls,
        })
    }
}
