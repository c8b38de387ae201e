//! JSON-RPC 2.0 envelope for the tool service.
//!
//! Two methods are understood: `tools/list` and `tools/call`. Tool failures are
//! not protocol errors; they come back as a normal result with `isError` set so
//! the caller can hand the text to the model.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ToolRegistry;
use crate::errors::AgentError;
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_LIST_TOOLS: &str = "tools/list";
pub const METHOD_CALL_TOOL: &str = "tools/call";

pub const PARSE_ERROR: i64 = -32700;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: json!(id),
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

/// Serve one request against the registry
pub async fn handle(registry: &ToolRegistry, request: RpcRequest) -> RpcResponse {
    let id = request.id;
    match request.method.as_str() {
        METHOD_LIST_TOOLS => match registry.tools().await {
            Ok(tools) => RpcResponse::success(
                id,
                json!(ListToolsResult {
                    tools: tools.to_vec()
                }),
            ),
            Err(err) => RpcResponse::failure(id, INTERNAL_ERROR, err.to_string()),
        },
        METHOD_CALL_TOOL => {
            let params: CallToolParams = match serde_json::from_value(request.params) {
                Ok(params) => params,
                Err(err) => return RpcResponse::failure(id, INVALID_PARAMS, err.to_string()),
            };
            let arguments = params.arguments.unwrap_or_else(|| json!({}));
            let result = match registry.dispatch(ToolCall::new(params.name, arguments)).await {
                Ok(content) => CallToolResult {
                    content,
                    is_error: false,
                },
                Err(err) => CallToolResult {
                    content: vec![Content::text(err.to_string())],
                    is_error: true,
                },
            };
            RpcResponse::success(id, json!(result))
        }
        other => RpcResponse::failure(id, METHOD_NOT_FOUND, format!("unknown method {}", other)),
    }
}

/// Turn a `tools/call` result back into the registry's result type
pub fn into_tool_result(result: CallToolResult) -> Result<Vec<Content>, AgentError> {
    if result.is_error {
        let text = result
            .content
            .iter()
            .map(Content::as_text)
            .collect::<Vec<_>>()
            .join("\n");
        return Err(AgentError::ExecutionError(text));
    }
    Ok(result.content)
}
