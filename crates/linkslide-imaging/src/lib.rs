pub mod artifact;
pub mod backend;
pub mod direct;
pub mod error;
pub mod polling;
pub mod runner;

pub use artifact::{ArtifactFetcher, HttpArtifactFetcher};
pub use backend::{BackendConfig, ImageBackend, ImageBackends, JobStatus, Submission};
pub use direct::DirectBackend;
pub use error::JobError;
pub use polling::PollingBackend;
pub use runner::{AttemptStatus, JobAttempt, JobOutcome, JobPolicy, JobRunner, SlideJob};
