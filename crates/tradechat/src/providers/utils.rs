use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tracing::warn;

use super::base::{OutputSchema, StructuredOutputError};
use crate::errors::AgentError;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Placeholder function name for tool requests the model emitted with an unusable name.
/// They still need to appear in the history so their error response has a matching call.
const INVALID_TOOL_NAME: &str = "invalid_tool_name";

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        let mut converted = Map::new();
        converted.insert("role".to_string(), json!(message.role));

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut output = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        text_parts.push(text.text.as_str());
                    }
                }
                MessageContent::ToolRequest(request) => {
                    let (name, arguments) = match &request.tool_call {
                        Ok(tool_call) => (
                            sanitize_function_name(&tool_call.name),
                            tool_call.arguments.to_string(),
                        ),
                        Err(_) => (INVALID_TOOL_NAME.to_string(), "{}".to_string()),
                    };
                    tool_calls.push(json!({
                        "id": request.id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": arguments,
                        }
                    }));
                }
                MessageContent::ToolResponse(response) => {
                    // A tool result error is shown as output so the model can interpret the error message
                    let text = content.as_tool_response_text().unwrap_or_default();
                    output.push(json!({
                        "role": "tool",
                        "content": text,
                        "tool_call_id": response.id
                    }));
                }
            }
        }

        if !text_parts.is_empty() {
            converted.insert("content".to_string(), json!(text_parts.join("\n")));
        }
        if !tool_calls.is_empty() {
            converted.insert("tool_calls".to_string(), json!(tool_calls));
        }

        // Tool messages are fully described by their responses
        let keep = message.role != Role::Tool
            && (converted.contains_key("content") || converted.contains_key("tool_calls"));
        if keep {
            output.insert(0, Value::Object(converted));
        }
        messages_spec.extend(output);
    }

    messages_spec
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Build the `response_format` block asking for a strict json schema answer
pub fn output_schema_to_openai_spec(schema: &OutputSchema) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": schema.name,
            "strict": true,
            "schema": schema.schema,
        }
    })
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: Value) -> Result<Message> {
    let original = response["choices"][0]["message"].clone();
    if original.is_null() {
        return Err(anyhow!("Response contained no message: {}", response));
    }
    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(|t| t.as_str()) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(|t| t.as_array()) {
        let mut seen = HashSet::new();
        for (index, tool_call) in tool_calls.iter().enumerate() {
            let id = unique_call_id(tool_call["id"].as_str(), index, &mut seen);
            let function_name = tool_call["function"]["name"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let arguments = tool_call["function"]["arguments"]
                .as_str()
                .unwrap_or_default();

            if !is_valid_function_name(&function_name) {
                let error = AgentError::ToolNotFound(format!(
                    "The provided function name '{}' had invalid characters, it must match this regex [a-zA-Z0-9_-]+",
                    function_name
                ));
                message = message.with_tool_request(id, Err(error));
                continue;
            }

            let params = parse_arguments(&id, arguments);
            message = message.with_tool_request(id, Ok(ToolCall::new(&function_name, params)));
        }
    }

    Ok(message)
}

/// Request ids must be unique within a message, so missing or repeated ids
/// are replaced with a positional one
fn unique_call_id(id: Option<&str>, index: usize, seen: &mut HashSet<String>) -> String {
    let mut candidate = match id {
        Some(id) if !id.is_empty() && !seen.contains(id) => id.to_string(),
        _ => {
            warn!(call_id = ?id, index, "tool call without a usable id");
            format!("call_{}", index)
        }
    };
    let mut suffix = 1;
    while seen.contains(&candidate) {
        candidate = format!("call_{}_{}", index, suffix);
        suffix += 1;
    }
    seen.insert(candidate.clone());
    candidate
}

/// Arguments that do not parse into a json object are replaced with an empty object.
/// The call still goes out and the tool reports what is missing.
fn parse_arguments(id: &str, arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(params) if params.is_object() => params,
        Ok(params) => {
            warn!(call_id = id, arguments = %params, "tool arguments were not an object");
            json!({})
        }
        Err(e) => {
            warn!(call_id = id, error = %e, "could not parse tool arguments");
            json!({})
        }
    }
}

/// Pull the structured answer out of a chat completion made with a json schema
pub fn openai_response_to_structured(response: &Value) -> Result<Value> {
    let message = &response["choices"][0]["message"];
    if let Some(refusal) = message.get("refusal").and_then(|r| r.as_str()) {
        return Err(StructuredOutputError(format!("model refused: {}", refusal)).into());
    }
    let text = message
        .get("content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| StructuredOutputError("response had no text content".to_string()))?;
    let value: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| StructuredOutputError(format!("{}: {}", e, text)))?;
    if !value.is_object() {
        return Err(StructuredOutputError(format!("expected a json object, got {}", value)).into());
    }
    Ok(value)
}

// Some openai compatible hosts wrap json answers in a markdown fence
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
