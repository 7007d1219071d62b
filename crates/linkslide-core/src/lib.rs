pub mod errors;
pub mod events;
pub mod ids;
pub mod layout;
pub mod messages;
pub mod pipeline;
pub mod provider;
pub mod session;
pub mod slides;
pub mod stream;
pub mod tools;

pub use events::{PipelineEvent, ProgressEvent, StepStatus};
pub use ids::{SessionId, ToolCallId};
pub use layout::OutputLayout;
pub use pipeline::{Pipeline, PipelineStream, RunRequest};
pub use session::{GenerationOptions, QualityMode, Session};
pub use slides::{PackageLocations, SlideRecord};
