//! Translates the agent's pipeline events into client-facing progress events.
//!
//! The bridge pulls one pipeline event at a time and yields its notification
//! before pulling the next, so the client sees progress in pipeline order.
//! Every translated stream ends with exactly one `finish` or one `error`.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use linkslide_core::events::{PipelineEvent, ProgressEvent, StepStatus};
use linkslide_core::pipeline::PipelineStream;
use linkslide_core::session::{QualityMode, Session};
use linkslide_core::SlideRecord;
use linkslide_packaging::Packager;
use linkslide_store::{SlideStore, StoreError};

pub type ProgressStream = Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>;

const SEARCH_TOOL: &str = "search";
const SLIDE_TOOL: &str = "generate_slide";
const FINISH_TOOL: &str = "finish_ppt";

/// Identity of a `step` notification for deduplication.
type StepKey = (String, Option<u32>);

#[derive(Clone)]
pub struct ProgressBridge {
    store: SlideStore,
    packager: Arc<dyn Packager>,
}

impl ProgressBridge {
    pub fn new(store: SlideStore, packager: Arc<dyn Packager>) -> Self {
        Self { store, packager }
    }

    pub fn translate(&self, session: Session, events: PipelineStream) -> ProgressStream {
        let store = self.store.clone();
        let packager = Arc::clone(&self.packager);

        Box::pin(async_stream::stream! {
            let mut events = events;
            let mut seen: HashSet<StepKey> = HashSet::new();
            let mut outcome: Option<Result<(), String>> = None;

            while let Some(event) = events.next().await {
                match event {
                    PipelineEvent::TextDelta { delta } => {
                        if !delta.trim().is_empty() {
                            yield ProgressEvent::thinking(delta);
                        }
                    }
                    PipelineEvent::ToolCallStarted { tool_name, arguments, .. } => {
                        match tool_step(&tool_name, &arguments, session.mode) {
                            Ok(Some((key, step))) => {
                                if seen.insert(key) {
                                    yield step;
                                } else {
                                    debug!(tool = %tool_name, "duplicate step suppressed");
                                }
                            }
                            Ok(None) => {}
                            Err(reason) => {
                                warn!(session_id = %session.id, tool = %tool_name, reason, "skipping malformed tool event");
                            }
                        }
                    }
                    PipelineEvent::ToolCallFinished { tool_name, is_error, duration_ms, .. } => {
                        debug!(tool = %tool_name, is_error, duration_ms, "tool finished");
                    }
                    PipelineEvent::RunCompleted => {
                        outcome = Some(Ok(()));
                        break;
                    }
                    PipelineEvent::RunFailed { error } => {
                        outcome = Some(Err(format!("Generation failed: {error}")));
                        break;
                    }
                }
            }

            match outcome {
                None => {
                    warn!(session_id = %session.id, "pipeline ended without a terminal event");
                    yield ProgressEvent::error("Generation ended unexpectedly");
                }
                Some(Err(message)) => {
                    yield ProgressEvent::error(message);
                }
                Some(Ok(())) => {
                    match read_slides(&store, &session).await {
                        Err(message) => {
                            yield ProgressEvent::error(message);
                        }
                        Ok(slides) => {
                            for slide in &slides {
                                yield ProgressEvent::SlideDone { data: slide.clone() };
                            }
                            match packager.package(&session.id, &slides).await {
                                Ok(packaged) => {
                                    info!(session_id = %session.id, slides = slides.len(), "session finished");
                                    yield ProgressEvent::Finish { data: packaged.locations };
                                }
                                Err(e) => {
                                    warn!(session_id = %session.id, error = %e, "packaging failed");
                                    yield ProgressEvent::error(format!("Packaging failed: {e}"));
                                }
                            }
                        }
                    }
                }
            }
        })
    }
}

async fn read_slides(store: &SlideStore, session: &Session) -> Result<Vec<SlideRecord>, String> {
    let store = store.clone();
    let id = session.id.clone();
    match tokio::task::spawn_blocking(move || store.read_all(&id)).await {
        Ok(Ok(slides)) => Ok(slides),
        Ok(Err(StoreError::NoSlides)) => Err("No slides generated".to_string()),
        Ok(Err(e)) => Err(format!("Could not read slides: {e}")),
        Err(e) => Err(format!("Could not read slides: {e}")),
    }
}

/// Map a tool invocation to its step notification and dedup key.
///
/// `Ok(None)` for tools without a notification, whatever their arguments;
/// `Err` for arguments of a known tool that cannot be interpreted.
fn tool_step(
    tool_name: &str,
    arguments: &Value,
    mode: QualityMode,
) -> Result<Option<(StepKey, ProgressEvent)>, &'static str> {
    let status = match tool_name {
        SEARCH_TOOL => StepStatus::Searching,
        SLIDE_TOOL => StepStatus::Generating,
        FINISH_TOOL => StepStatus::Bundling,
        _ => return Ok(None),
    };
    let page = page_index(arguments)?;
    let message = match (status, page) {
        (StepStatus::Searching, _) => "Searching the web...".to_string(),
        (StepStatus::Generating, page) => {
            let hint = if mode.is_pro() { " (pro, high quality)" } else { "" };
            match page {
                Some(page) => format!("Generating page {page}{hint}..."),
                None => format!("Generating slide{hint}..."),
            }
        }
        _ => "Bundling the presentation...".to_string(),
    };
    Ok(Some((
        (tool_name.to_string(), page),
        ProgressEvent::step(status, message),
    )))
}

fn page_index(arguments: &Value) -> Result<Option<u32>, &'static str> {
    match arguments.get("page_index") {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => raw
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or("page_index is not a non-negative integer"),
    }
}
