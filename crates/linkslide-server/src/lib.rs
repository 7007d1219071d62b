pub mod bridge;
pub mod error;
pub mod orchestrator;
pub mod server;

pub use bridge::{ProgressBridge, ProgressStream};
pub use error::ServerError;
pub use orchestrator::SessionOrchestrator;
pub use server::{build_router, start, AppState, ServerConfig, ServerHandle};
