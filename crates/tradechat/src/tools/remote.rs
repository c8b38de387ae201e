use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::rpc::{
    into_tool_result, CallToolResult, ListToolsResult, RpcRequest, RpcResponse, METHOD_CALL_TOOL,
    METHOD_LIST_TOOLS,
};
use super::ToolProvider;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

/// Tools served by a separate process over JSON-RPC on http
pub struct RemoteToolProvider {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RemoteToolProvider {
    pub fn new(url: impl Into<String>) -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AgentError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> AgentResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .client
            .post(&self.url)
            .json(&RpcRequest::new(id, method, params))
            .send()
            .await
            .map_err(|e| AgentError::ExecutionError(format!("tool service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::ExecutionError(format!(
                "tool service returned {}",
                status
            )));
        }

        let response: RpcResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Internal(format!("invalid tool service reply: {}", e)))?;
        if let Some(error) = response.error {
            return Err(AgentError::ExecutionError(format!(
                "{} (code {})",
                error.message, error.code
            )));
        }
        let result = response
            .result
            .ok_or_else(|| AgentError::Internal("tool service reply has no result".to_string()))?;
        serde_json::from_value(result)
            .map_err(|e| AgentError::Internal(format!("invalid tool service reply: {}", e)))
    }
}

#[async_trait]
impl ToolProvider for RemoteToolProvider {
    fn name(&self) -> &str {
        &self.url
    }

    async fn list_tools(&self) -> AgentResult<Vec<Tool>> {
        let result: ListToolsResult = self.request(METHOD_LIST_TOOLS, json!({})).await?;
        Ok(result.tools)
    }

    async fn call_tool(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        let result: CallToolResult = self
            .request(
                METHOD_CALL_TOOL,
                json!({"name": tool_call.name, "arguments": tool_call.arguments}),
            )
            .await?;
        into_tool_result(result)
    }
}
