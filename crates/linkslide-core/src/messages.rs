use serde::{Deserialize, Serialize};

use crate::ids::ToolCallId;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "user")]
    User { text: String },
    #[serde(rename = "assistant")]
    Assistant(AssistantMessage),
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_call_id: ToolCallId,
        content: String,
        is_error: bool,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub content: Vec<AssistantContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallBlock),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallBlock {
    pub id: ToolCallId,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

impl StopReason {
    /// Map an OpenAI-style `finish_reason`.
    pub fn from_finish_reason(reason: &str) -> Self {
        match reason {
            "tool_calls" | "function_call" => Self::ToolUse,
            "length" => Self::MaxTokens,
            _ => Self::EndTurn,
        }
    }
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Message::User { text: text.into() }
    }

    pub fn tool_result(tool_call_id: ToolCallId, content: impl Into<String>, is_error: bool) -> Self {
        Message::ToolResult {
            tool_call_id,
            content: content.into(),
            is_error,
        }
    }
}

impl AssistantMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![AssistantContent::Text { text: text.into() }],
            stop_reason: Some(StopReason::EndTurn),
        }
    }

    pub fn tool_calls(&self) -> Vec<&ToolCallBlock> {
        self.content
            .iter()
            .filter_map(|c| match c {
                AssistantContent::ToolCall(tc) => Some(tc),
                AssistantContent::Text { .. } => None,
            })
            .collect()
    }

    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text { text } => Some(text.as_str()),
                AssistantContent::ToolCall(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, AssistantContent::ToolCall(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_text_message() {
        let json = serde_json::to_value(Message::user_text("hello")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["text"], "hello");
    }

    #[test]
    fn tool_result_message() {
        let id = ToolCallId::new();
        let json = serde_json::to_value(Message::tool_result(id.clone(), "ok", false)).unwrap();
        assert_eq!(json["role"], "tool_result");
        assert_eq!(json["tool_call_id"], id.as_str());
        assert_eq!(json["is_error"], false);
    }

    #[test]
    fn assistant_tool_calls_extracted() {
        let msg = AssistantMessage {
            content: vec![
                AssistantContent::Text {
                    text: "drawing slide".into(),
                },
                AssistantContent::ToolCall(ToolCallBlock {
                    id: ToolCallId::new(),
                    name: "generate_slide".into(),
                    arguments: serde_json::json!({"page_index": 1}),
                }),
            ],
            stop_reason: Some(StopReason::ToolUse),
        };
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls()[0].name, "generate_slide");
        assert_eq!(msg.text_content(), "drawing slide");
        assert!(!AssistantMessage::text("done").has_tool_calls());
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(StopReason::from_finish_reason("tool_calls"), StopReason::ToolUse);
        assert_eq!(StopReason::from_finish_reason("length"), StopReason::MaxTokens);
        assert_eq!(StopReason::from_finish_reason("stop"), StopReason::EndTurn);
    }
}
