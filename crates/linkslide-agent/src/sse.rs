use serde::Deserialize;
use serde_json::Value;

use linkslide_core::errors::GatewayError;
use linkslide_core::ids::ToolCallId;
use linkslide_core::messages::{AssistantContent, AssistantMessage, StopReason, ToolCallBlock};
use linkslide_core::stream::StreamEvent;

/// State machine for OpenAI-compatible chat completion chunks.
///
/// Text is forwarded as it arrives; tool-call fragments are accumulated by
/// their `index` and released as `ToolCallEnd` when the stream finishes.
#[derive(Default)]
pub struct ChatSseParser {
    started: bool,
    finished: bool,
    text: String,
    tool_blocks: Vec<ToolBlock>,
    finish_reason: Option<String>,
}

struct ToolBlock {
    index: usize,
    id: ToolCallId,
    name: String,
    arguments_json: String,
    announced: bool,
}

impl ChatSseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// True once the server reported a finish reason, even without `[DONE]`.
    pub fn saw_finish_reason(&self) -> bool {
        self.finish_reason.is_some()
    }

    /// Parse one `data:` payload.
    pub fn parse_data(&mut self, data: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        let data = data.trim();
        if data == "[DONE]" {
            events.extend(self.finish());
            return events;
        }

        let chunk: ChatChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable stream chunk");
                return events;
            }
        };

        if let Some(err) = chunk.error {
            self.finished = true;
            events.push(StreamEvent::Error {
                error: classify_error(&err),
            });
            return events;
        }

        if !self.started {
            self.started = true;
            events.push(StreamEvent::Start);
        }

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                self.text.push_str(&content);
                events.push(StreamEvent::TextDelta { delta: content });
            }

            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                self.apply_tool_fragment(fragment, &mut events);
            }

            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
        }

        events
    }

    fn apply_tool_fragment(&mut self, fragment: ToolCallFragment, events: &mut Vec<StreamEvent>) {
        let pos = match self.tool_blocks.iter().position(|b| b.index == fragment.index) {
            Some(pos) => pos,
            None => {
                let id = fragment
                    .id
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .map(ToolCallId::from_raw)
                    .unwrap_or_default();
                self.tool_blocks.push(ToolBlock {
                    index: fragment.index,
                    id,
                    name: String::new(),
                    arguments_json: String::new(),
                    announced: false,
                });
                self.tool_blocks.len() - 1
            }
        };
        let block = &mut self.tool_blocks[pos];

        if let Some(function) = fragment.function {
            if let Some(name) = function.name {
                block.name.push_str(&name);
            }
            if !block.announced && !block.name.is_empty() {
                block.announced = true;
                events.push(StreamEvent::ToolCallStart {
                    tool_call_id: block.id.clone(),
                    name: block.name.clone(),
                });
            }
            if let Some(args) = function.arguments.filter(|a| !a.is_empty()) {
                block.arguments_json.push_str(&args);
                events.push(StreamEvent::ToolCallDelta {
                    tool_call_id: block.id.clone(),
                    arguments_delta: args,
                });
            }
        }
    }

    /// Release accumulated tool calls and the final message.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = Vec::new();
        if !self.started {
            self.started = true;
            events.push(StreamEvent::Start);
        }

        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(AssistantContent::Text {
                text: std::mem::take(&mut self.text),
            });
        }

        self.tool_blocks.sort_by_key(|b| b.index);
        for block in self.tool_blocks.drain(..) {
            let arguments: Value = if block.arguments_json.trim().is_empty() {
                Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&block.arguments_json)
                    .unwrap_or(Value::String(block.arguments_json.clone()))
            };
            let tool_call = ToolCallBlock {
                id: block.id,
                name: block.name,
                arguments,
            };
            events.push(StreamEvent::ToolCallEnd {
                tool_call: tool_call.clone(),
            });
            content.push(AssistantContent::ToolCall(tool_call));
        }

        let has_tools = content
            .iter()
            .any(|c| matches!(c, AssistantContent::ToolCall(_)));
        let stop_reason = if has_tools {
            StopReason::ToolUse
        } else {
            self.finish_reason
                .as_deref()
                .map(StopReason::from_finish_reason)
                .unwrap_or(StopReason::EndTurn)
        };

        events.push(StreamEvent::Done {
            message: AssistantMessage {
                content,
                stop_reason: Some(stop_reason),
            },
            stop_reason,
        });
        events
    }
}

fn classify_error(err: &Value) -> GatewayError {
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown stream error")
        .to_string();
    match err.get("code").and_then(Value::as_u64) {
        Some(code) => GatewayError::from_status(code as u16, message),
        None => GatewayError::StreamInterrupted(message),
    }
}

/// Extract `data:` payloads from a block of complete SSE events.
pub fn parse_data_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim_start().to_string())
        .collect()
}

// --- Deserialization types for chat completion chunks ---

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallFragment>>,
}

#[derive(Deserialize)]
struct ToolCallFragment {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionFragment>,
}

#[derive(Deserialize)]
struct FunctionFragment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut ChatSseParser, chunks: &[&str]) -> Vec<StreamEvent> {
        chunks.iter().flat_map(|c| parser.parse_data(c)).collect()
    }

    #[test]
    fn text_stream() {
        let mut parser = ChatSseParser::new();
        let events = feed(
            &mut parser,
            &[
                r#"{"choices":[{"delta":{"role":"assistant","content":"Plan"}}]}"#,
                r#"{"choices":[{"delta":{"content":"ning"}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ],
        );

        assert!(matches!(events[0], StreamEvent::Start));
        assert!(matches!(&events[1], StreamEvent::TextDelta { delta } if delta == "Plan"));
        match events.last().unwrap() {
            StreamEvent::Done {
                message,
                stop_reason,
            } => {
                assert_eq!(*stop_reason, StopReason::EndTurn);
                assert_eq!(message.text_content(), "Planning");
            }
            other => panic!("expected Done, got {other:?}"),
        }
        assert!(parser.is_finished());
    }

    #[test]
    fn tool_call_fragments_accumulate() {
        let mut parser = ChatSseParser::new();
        let events = feed(
            &mut parser,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"generate_slide","arguments":""}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"page_index\":"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"2}"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"finish_ppt","arguments":"{}"}}]}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        );

        let starts: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolCallStart { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec!["generate_slide", "finish_ppt"]);

        let Some(StreamEvent::Done {
            message,
            stop_reason,
        }) = events.last()
        else {
            panic!("expected Done");
        };
        assert_eq!(*stop_reason, StopReason::ToolUse);
        let calls = message.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id.as_str(), "call_a");
        assert_eq!(calls[0].arguments["page_index"], 2);
        assert_eq!(calls[1].name, "finish_ppt");
    }

    #[test]
    fn malformed_arguments_are_kept_as_string() {
        let mut parser = ChatSseParser::new();
        feed(
            &mut parser,
            &[r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c","function":{"name":"search","arguments":"{oops"}}]}}]}"#],
        );
        let events = parser.finish();
        let Some(StreamEvent::Done { message, .. }) = events.last() else {
            panic!("expected Done");
        };
        assert_eq!(message.tool_calls()[0].arguments, Value::String("{oops".into()));
    }

    #[test]
    fn error_chunk_becomes_error_event() {
        let mut parser = ChatSseParser::new();
        let events = parser.parse_data(r#"{"error":{"message":"slow down","code":429}}"#);
        assert!(matches!(
            &events[0],
            StreamEvent::Error {
                error: GatewayError::RateLimited
            }
        ));
        assert!(parser.is_finished());
    }

    #[test]
    fn data_lines_extracted() {
        let lines = parse_data_lines(": keep-alive\ndata: {\"a\":1}\n\ndata:[DONE]\n\n");
        assert_eq!(lines, vec![r#"{"a":1}"#.to_string(), "[DONE]".to_string()]);
    }
}
