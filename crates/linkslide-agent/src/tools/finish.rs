use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use linkslide_core::tools::{Tool, ToolContext, ToolError, ToolResult};
use linkslide_packaging::Packager;
use linkslide_store::{SlideStore, StoreError};
use serde_json::Value;
use tracing::instrument;

use super::FINISH_PPT;

/// Packages every slide recorded so far into the viewer and archive.
pub struct FinishTool {
    store: SlideStore,
    packager: Arc<dyn Packager>,
}

impl FinishTool {
    pub fn new(store: SlideStore, packager: Arc<dyn Packager>) -> Self {
        Self { store, packager }
    }
}

#[async_trait]
impl Tool for FinishTool {
    fn name(&self) -> &str {
        FINISH_PPT
    }

    fn description(&self) -> &str {
        "Bundle all generated slides into the final presentation. Call once after the last slide"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    #[instrument(skip_all, fields(session_id = %ctx.session.id))]
    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        let start = Instant::now();
        let session_id = ctx.session.id.clone();

        let store = self.store.clone();
        let id = session_id.clone();
        let read = tokio::task::spawn_blocking(move || store.read_all(&id))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("store task failed: {e}")))?;

        let slides = match read {
            Ok(slides) => slides,
            Err(StoreError::NoSlides) => {
                return Ok(ToolResult::error("Error: no slides generated"));
            }
            Err(e) => return Err(ToolError::ExecutionFailed(e.to_string())),
        };

        let packaged = self
            .packager
            .package(&session_id, &slides)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        let content = serde_json::to_string(&packaged.locations)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let mut result = ToolResult::ok(content);
        result.duration = start.elapsed();
        Ok(result)
    }
}
