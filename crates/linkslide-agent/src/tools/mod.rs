pub mod finish;
pub mod search;
pub mod slide;

use std::sync::Arc;

use crate::registry::ToolRegistry;

pub use finish::FinishTool;
pub use search::SearchTool;
pub use slide::GenerateSlideTool;

pub const GENERATE_SLIDE: &str = "generate_slide";
pub const FINISH_PPT: &str = "finish_ppt";
pub const SEARCH: &str = "search";

/// Registry with the slide tools, plus search when an endpoint is configured.
pub fn create_registry(
    slide: GenerateSlideTool,
    finish: FinishTool,
    search: Option<SearchTool>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(slide));
    registry.register(Arc::new(finish));
    if let Some(search) = search {
        registry.register(Arc::new(search));
    }
    registry
}
