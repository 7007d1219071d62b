/// Failure of a single image-job attempt.
///
/// Only `PollTransient` is absorbed inside the polling window; every other
/// variant ends the attempt.
#[derive(Clone, Debug, thiserror::Error)]
pub enum JobError {
    #[error("submit failed: {0}")]
    Submit(String),

    #[error("transient poll error: {0}")]
    PollTransient(String),

    #[error("job failed: {0}")]
    JobFailed(String),

    #[error("polling timed out after {polls} polls")]
    JobTimeout { polls: u32 },

    #[error("artifact fetch failed: {0}")]
    ArtifactFetch(String),
}

impl JobError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Submit(_) => "submit",
            Self::PollTransient(_) => "poll_transient",
            Self::JobFailed(_) => "job_failed",
            Self::JobTimeout { .. } => "job_timeout",
            Self::ArtifactFetch(_) => "artifact_fetch",
        }
    }
}
