use std::pin::Pin;

use futures::Stream;

use crate::events::PipelineEvent;
use crate::session::Session;

pub type PipelineStream = Pin<Box<dyn Stream<Item = PipelineEvent> + Send>>;

/// A request to run the slide-generation agent for one session.
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub session: Session,
    pub prompt: String,
}

/// The agent pipeline as seen by the orchestrator: given a session and a
/// composed prompt, produce a finite stream of pipeline events that ends
/// with `RunCompleted` or `RunFailed`.
pub trait Pipeline: Send + Sync {
    fn start(&self, request: RunRequest) -> PipelineStream;
}
