use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use serde_json::Value;

use linkslide_core::errors::GatewayError;
use linkslide_core::ids::ToolCallId;
use linkslide_core::messages::{AssistantContent, AssistantMessage, StopReason, ToolCallBlock};
use linkslide_core::provider::{LlmContext, LlmProvider, ProviderStream};
use linkslide_core::stream::StreamEvent;

/// Pre-programmed responses for deterministic runs without API calls.
pub enum MockResponse {
    /// Yield a sequence of StreamEvents.
    Stream(Vec<StreamEvent>),
    /// Return an error from the stream() call itself.
    Error(GatewayError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// A plain text turn that ends the run.
    pub fn stream_text(text: &str) -> Self {
        let text = text.to_string();
        Self::Stream(vec![
            StreamEvent::Start,
            StreamEvent::TextDelta {
                delta: text.clone(),
            },
            StreamEvent::Done {
                message: AssistantMessage::text(&text),
                stop_reason: StopReason::EndTurn,
            },
        ])
    }

    /// A turn with optional leading text followed by tool calls.
    pub fn tool_calls(text: &str, calls: Vec<(&str, Value)>) -> Self {
        let mut events = vec![StreamEvent::Start];
        let mut content = Vec::new();
        if !text.is_empty() {
            events.push(StreamEvent::TextDelta {
                delta: text.to_string(),
            });
            content.push(AssistantContent::Text {
                text: text.to_string(),
            });
        }
        for (name, arguments) in calls {
            let block = ToolCallBlock {
                id: ToolCallId::new(),
                name: name.to_string(),
                arguments,
            };
            events.push(StreamEvent::ToolCallStart {
                tool_call_id: block.id.clone(),
                name: block.name.clone(),
            });
            events.push(StreamEvent::ToolCallEnd {
                tool_call: block.clone(),
            });
            content.push(AssistantContent::ToolCall(block));
        }
        events.push(StreamEvent::Done {
            message: AssistantMessage {
                content,
                stop_reason: Some(StopReason::ToolUse),
            },
            stop_reason: StopReason::ToolUse,
        });
        Self::Stream(events)
    }

    /// A stream that ends with an error event.
    pub fn stream_error(error: GatewayError) -> Self {
        Self::Stream(vec![StreamEvent::Start, StreamEvent::Error { error }])
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider that returns pre-programmed responses in sequence.
pub struct MockProvider {
    responses: Mutex<VecDeque<MockResponse>>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn stream(&self, _context: &LlmContext) -> Result<ProviderStream, GatewayError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        let Some(response) = self.responses.lock().pop_front() else {
            return Err(GatewayError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )));
        };
        resolve_response(response).await
    }
}

/// Unrolls nested delays iteratively to avoid recursive async.
async fn resolve_response(response: MockResponse) -> Result<ProviderStream, GatewayError> {
    let mut current = response;
    loop {
        match current {
            MockResponse::Stream(events) => return Ok(Box::pin(stream::iter(events))),
            MockResponse::Error(e) => return Err(e),
            MockResponse::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}
