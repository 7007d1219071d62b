use serde_json::{json, Value};

use linkslide_core::messages::{AssistantContent, AssistantMessage, Message};
use linkslide_core::provider::LlmContext;

/// Convert a full LlmContext into an OpenAI-compatible chat completion body.
pub fn build_request_body(context: &LlmContext, model: &str) -> Value {
    let mut messages = Vec::with_capacity(context.messages.len() + 1);
    if !context.system_prompt.is_empty() {
        messages.push(json!({"role": "system", "content": context.system_prompt}));
    }
    messages.extend(context.messages.iter().map(convert_message));

    let mut body = json!({
        "model": model,
        "stream": true,
        "messages": messages,
    });

    if !context.tools.is_empty() {
        let tools: Vec<Value> = context
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }

    body
}

fn convert_message(message: &Message) -> Value {
    match message {
        Message::User { text } => json!({"role": "user", "content": text}),
        Message::Assistant(msg) => convert_assistant(msg),
        Message::ToolResult {
            tool_call_id,
            content,
            ..
        } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        }),
    }
}

fn convert_assistant(msg: &AssistantMessage) -> Value {
    let text = msg.text_content();
    let content = if text.is_empty() { Value::Null } else { Value::String(text) };
    let mut value = json!({
        "role": "assistant",
        "content": content,
    });

    let tool_calls: Vec<Value> = msg
        .content
        .iter()
        .filter_map(|c| match c {
            AssistantContent::ToolCall(tc) => Some(json!({
                "id": tc.id,
                "type": "function",
                "function": {
                    "name": tc.name,
                    "arguments": tc.arguments.to_string(),
                }
            })),
            AssistantContent::Text { .. } => None,
        })
        .collect();
    if !tool_calls.is_empty() {
        value["tool_calls"] = json!(tool_calls);
    }
    value
}

#[cfg(test)]
mod tests {
    use linkslide_core::messages::{StopReason, ToolCallBlock};
    use linkslide_core::tools::ToolDefinition;
    use linkslide_core::ToolCallId;

    use super::*;

    #[test]
    fn full_conversation_body() {
        let call_id = ToolCallId::from_raw("call_1");
        let context = LlmContext {
            system_prompt: "You build decks.".into(),
            messages: vec![
                Message::user_text("quarterly review"),
                Message::Assistant(AssistantMessage {
                    content: vec![AssistantContent::ToolCall(ToolCallBlock {
                        id: call_id.clone(),
                        name: "generate_slide".into(),
                        arguments: json!({"page_index": 1}),
                    })],
                    stop_reason: Some(StopReason::ToolUse),
                }),
                Message::tool_result(call_id, "Slide 1 generated", false),
            ],
            tools: vec![ToolDefinition {
                name: "finish_ppt".into(),
                description: "Bundle the deck".into(),
                parameters_schema: json!({"type": "object", "properties": {}}),
            }],
        };

        let body = build_request_body(&context, "gpt-4o");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "quarterly review");
        assert!(messages[2]["content"].is_null());
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            messages[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"page_index":1}"#
        );
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");

        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "finish_ppt");
    }

    #[test]
    fn no_tools_key_when_empty() {
        let body = build_request_body(&LlmContext::default(), "m");
        assert!(body.get("tools").is_none());
        assert!(body["messages"].as_array().unwrap().is_empty());
    }
}
