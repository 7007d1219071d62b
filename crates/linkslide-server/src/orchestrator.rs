use std::sync::Arc;

use futures::{stream, StreamExt};
use tracing::info;

use linkslide_core::events::{ProgressEvent, StepStatus};
use linkslide_core::pipeline::{Pipeline, RunRequest};
use linkslide_core::session::{compose_prompt, GenerationOptions, Session};

use crate::bridge::{ProgressBridge, ProgressStream};

/// Creates one session per request and wires its agent run to the bridge.
pub struct SessionOrchestrator {
    pipeline: Arc<dyn Pipeline>,
    bridge: ProgressBridge,
}

impl SessionOrchestrator {
    pub fn new(pipeline: Arc<dyn Pipeline>, bridge: ProgressBridge) -> Self {
        Self { pipeline, bridge }
    }

    /// Start a generation. The returned stream opens with a `planning` step
    /// and ends with one `finish` or one `error`.
    pub fn start(&self, topic: &str, options: &GenerationOptions) -> (Session, ProgressStream) {
        let session = Session::new(options.mode);
        let prompt = compose_prompt(topic, options);
        info!(
            session_id = %session.id,
            mode = session.mode.label(),
            prompt_len = prompt.len(),
            "session started"
        );

        let planning = ProgressEvent::step(
            StepStatus::Planning,
            format!("Agent started ({}), planning the deck...", session.mode.label()),
        );
        let events = self.pipeline.start(RunRequest {
            session: session.clone(),
            prompt,
        });
        let progress = self.bridge.translate(session.clone(), events);

        (session, Box::pin(stream::once(async move { planning }).chain(progress)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkslide_core::events::PipelineEvent;
    use linkslide_core::layout::OutputLayout;
    use linkslide_core::pipeline::PipelineStream;
    use linkslide_core::session::QualityMode;
    use linkslide_core::SlideRecord;
    use linkslide_packaging::FsPackager;
    use linkslide_store::SlideStore;
    use std::sync::Mutex;

    /// Pipeline that records a slide for the session and completes.
    struct ScriptedPipeline {
        store: SlideStore,
        captured: Arc<Mutex<Option<RunRequest>>>,
    }

    impl Pipeline for ScriptedPipeline {
        fn start(&self, request: RunRequest) -> PipelineStream {
            self.store
                .append(&request.session.id, SlideRecord::new(1, "/img/1.jpg", "intro"))
                .unwrap();
            *self.captured.lock().unwrap() = Some(request);
            Box::pin(stream::iter(vec![
                PipelineEvent::TextDelta { delta: "thinking".into() },
                PipelineEvent::RunCompleted,
            ]))
        }
    }

    #[tokio::test]
    async fn planning_step_comes_first_and_prompt_is_composed() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path(), "/static/output");
        let store = SlideStore::new(layout.clone());
        let captured = Arc::new(Mutex::new(None));
        let orchestrator = SessionOrchestrator::new(
            Arc::new(ScriptedPipeline {
                store: store.clone(),
                captured: Arc::clone(&captured),
            }),
            ProgressBridge::new(store, Arc::new(FsPackager::new(layout))),
        );

        let options = GenerationOptions {
            mode: QualityMode::Pro,
            style_prompt: Some("Minimalist".into()),
            color_hint: Some("#1E3A8A".into()),
        };
        let (session, stream) = orchestrator.start("quarterly review", &options);
        let events: Vec<ProgressEvent> = stream.collect().await;

        assert_eq!(
            events[0],
            ProgressEvent::step(
                StepStatus::Planning,
                "Agent started (pro mode, high quality), planning the deck..."
            )
        );
        assert!(matches!(events.last(), Some(ProgressEvent::Finish { .. })));
        assert_eq!(session.mode, QualityMode::Pro);

        let request = captured.lock().unwrap().take().unwrap();
        assert_eq!(request.session.id, session.id);
        assert_eq!(
            request.prompt,
            "quarterly review\nMinimalist\nUse #1E3A8A as the primary color."
        );
    }
}
