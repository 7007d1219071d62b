use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, Instrument};

use linkslide_core::events::PipelineEvent;
use linkslide_core::pipeline::{Pipeline, PipelineStream, RunRequest};

use crate::runner::AgentRunner;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Runs the agent on its own task and exposes its events as a stream that
/// always ends with `RunCompleted` or `RunFailed`.
#[derive(Clone)]
pub struct AgentPipeline {
    runner: Arc<AgentRunner>,
}

impl AgentPipeline {
    pub fn new(runner: Arc<AgentRunner>) -> Self {
        Self { runner }
    }
}

impl Pipeline for AgentPipeline {
    fn start(&self, request: RunRequest) -> PipelineStream {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let runner = Arc::clone(&self.runner);
        let span = tracing::info_span!("agent_run", session_id = %request.session.id);

        tokio::spawn(
            async move {
                let terminal = match runner.run(&request.session, &request.prompt, &tx).await {
                    Ok(()) => {
                        info!("agent run completed");
                        PipelineEvent::RunCompleted
                    }
                    Err(e) => {
                        error!(error = %e, "agent run failed");
                        PipelineEvent::RunFailed {
                            error: e.to_string(),
                        }
                    }
                };
                if tx.send(terminal).await.is_err() {
                    tracing::debug!("no event receiver for terminal event");
                }
            }
            .instrument(span),
        );

        Box::pin(ReceiverStream::new(rx))
    }
}
