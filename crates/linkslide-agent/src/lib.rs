pub mod converter;
pub mod error;
pub mod mock;
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod registry;
pub mod runner;
pub mod sse;
pub mod tools;

pub use error::EngineError;
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use pipeline::AgentPipeline;
pub use registry::ToolRegistry;
pub use runner::{AgentConfig, AgentRunner};
