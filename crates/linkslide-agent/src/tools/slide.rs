use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use linkslide_core::tools::{Tool, ToolContext, ToolError, ToolResult};
use linkslide_core::SlideRecord;
use linkslide_imaging::{ImageBackends, JobRunner, SlideJob};
use linkslide_store::SlideStore;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::GENERATE_SLIDE;

/// Headroom past the job runner's bound for recording the slide.
const RECORD_GRACE: Duration = Duration::from_secs(30);

/// Generates one slide image and records it in the session's slide store.
pub struct GenerateSlideTool {
    runner: Arc<JobRunner>,
    backends: ImageBackends,
    store: SlideStore,
}

impl GenerateSlideTool {
    pub fn new(runner: Arc<JobRunner>, backends: ImageBackends, store: SlideStore) -> Self {
        Self {
            runner,
            backends,
            store,
        }
    }
}

/// Reads a strictly positive integer `page_index`.
pub fn parse_page_index(args: &Value) -> Result<u32, ToolError> {
    let raw = args
        .get("page_index")
        .ok_or_else(|| ToolError::InvalidArguments("page_index is required".into()))?;
    raw.as_u64()
        .filter(|n| *n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            ToolError::InvalidArguments(format!("page_index must be a positive integer, got {raw}"))
        })
}

#[async_trait]
impl Tool for GenerateSlideTool {
    fn name(&self) -> &str {
        GENERATE_SLIDE
    }

    fn description(&self) -> &str {
        "Generate one slide image from a detailed visual prompt and record its narration"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["prompt", "script", "page_index"],
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "Very detailed image prompt: exact slide text, layout, background, colors and style"
                },
                "script": {
                    "type": "string",
                    "description": "Narration for this slide"
                },
                "page_index": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "1-based page number"
                }
            }
        })
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.runner.policy().max_duration() + RECORD_GRACE)
    }

    #[instrument(skip_all, fields(session_id = %ctx.session.id))]
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let start = Instant::now();

        let prompt = args["prompt"]
            .as_str()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("prompt is required".into()))?
            .to_string();
        let script = args["script"].as_str().unwrap_or_default().to_string();
        let page = parse_page_index(&args)?;

        let session = &ctx.session;
        let backend = self.backends.select(session.mode);
        let job = SlideJob {
            prompt,
            slide_index: page,
            session_id: session.id.clone(),
        };
        let outcome = self.runner.run(backend.as_ref(), &job).await;
        let image_ref = outcome.image_ref();

        let store = self.store.clone();
        let session_id = session.id.clone();
        let record = SlideRecord::new(page, image_ref.clone(), script);
        tokio::task::spawn_blocking(move || store.append(&session_id, record))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("store task failed: {e}")))?
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let mut result = if outcome.is_success() {
            info!(slide = page, image = %image_ref, "slide generated");
            ToolResult::ok(format!("Slide {page} generated: {image_ref}"))
        } else {
            warn!(slide = page, attempts = outcome.attempts().len(), "slide generation failed");
            ToolResult::error(format!("Slide {page} failed: {image_ref}"))
        };
        result.duration = start.elapsed();
        Ok(result)
    }
}
