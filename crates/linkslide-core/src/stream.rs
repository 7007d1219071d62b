use crate::errors::GatewayError;
use crate::ids::ToolCallId;
use crate::messages::{AssistantMessage, StopReason, ToolCallBlock};

/// Events emitted during LLM streaming. Ordering contract:
///
/// Start → (TextDelta | ToolCallStart → ToolCallDelta* → ToolCallEnd)* → Done
///
/// Error can appear at any point and ends the stream.
#[derive(Clone, Debug)]
pub enum StreamEvent {
    Start,
    TextDelta { delta: String },
    ToolCallStart { tool_call_id: ToolCallId, name: String },
    ToolCallDelta { tool_call_id: ToolCallId, arguments_delta: String },
    ToolCallEnd { tool_call: ToolCallBlock },
    Done { message: AssistantMessage, stop_reason: StopReason },
    Error { error: GatewayError },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}
