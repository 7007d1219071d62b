use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::errors::GatewayError;
use crate::messages::Message;
use crate::stream::StreamEvent;
use crate::tools::ToolDefinition;

/// Everything sent to a provider for one turn.
#[derive(Clone, Debug, Default)]
pub struct LlmContext {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

pub type ProviderStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Trait implemented by each chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn stream(&self, context: &LlmContext) -> Result<ProviderStream, GatewayError>;
}
