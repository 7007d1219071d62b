use serde::{Deserialize, Serialize};

use crate::ids::ToolCallId;
use crate::slides::{PackageLocations, SlideRecord};

/// Events emitted by a generation pipeline while an agent run progresses.
///
/// Every run ends with exactly one of `RunCompleted` or `RunFailed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    TextDelta {
        delta: String,
    },

    ToolCallStarted {
        tool_call_id: ToolCallId,
        tool_name: String,
        arguments: serde_json::Value,
    },

    ToolCallFinished {
        tool_call_id: ToolCallId,
        tool_name: String,
        result_preview: String,
        is_error: bool,
        duration_ms: u64,
    },

    RunCompleted,

    RunFailed {
        error: String,
    },
}

impl PipelineEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text_delta",
            Self::ToolCallStarted { .. } => "tool_call_started",
            Self::ToolCallFinished { .. } => "tool_call_finished",
            Self::RunCompleted => "run_completed",
            Self::RunFailed { .. } => "run_failed",
        }
    }
}

/// Status tag of a `step` notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Planning,
    Thinking,
    Searching,
    Generating,
    Bundling,
}

/// User-facing progress notifications, serialized one per stream record.
///
/// `thinking` deltas travel as a `step` with status `thinking`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Step { status: StepStatus, message: String },
    SlideDone { data: SlideRecord },
    Finish { data: PackageLocations },
    Error { message: String },
}

impl ProgressEvent {
    pub fn thinking(delta: impl Into<String>) -> Self {
        Self::Step {
            status: StepStatus::Thinking,
            message: delta.into(),
        }
    }

    pub fn step(status: StepStatus, message: impl Into<String>) -> Self {
        Self::Step {
            status,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Kind as named in the data model: `thinking`, `step`, `slide_done`, `finish` or `error`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Step {
                status: StepStatus::Thinking,
                ..
            } => "thinking",
            Self::Step { .. } => "step",
            Self::SlideDone { .. } => "slide_done",
            Self::Finish { .. } => "finish",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }
}
