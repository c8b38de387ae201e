pub mod broker;
pub mod mock;
pub mod remote;
pub mod rpc;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

/// Core trait for anything that can list and run tools on the assistant's behalf
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Get the name of the provider, used in logs
    fn name(&self) -> &str;

    /// Get available tools
    async fn list_tools(&self) -> AgentResult<Vec<Tool>>;

    /// Call a tool with the given arguments
    async fn call_tool(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>>;
}

/// The process-wide tool set. The provider is asked for its tools once, on first
/// use; concurrent first callers wait on the same initialization.
pub struct ToolRegistry {
    provider: Arc<dyn ToolProvider>,
    tools: OnceCell<Vec<Tool>>,
}

impl ToolRegistry {
    pub fn new(provider: Arc<dyn ToolProvider>) -> Self {
        Self {
            provider,
            tools: OnceCell::new(),
        }
    }

    /// The tool definitions, loading them on the first call.
    /// A failed load is not cached, the next caller tries again.
    pub async fn tools(&self) -> AgentResult<&[Tool]> {
        let tools = self
            .tools
            .get_or_try_init(|| async {
                let tools = self.provider.list_tools().await?;
                info!(
                    provider = self.provider.name(),
                    count = tools.len(),
                    "loaded tool definitions"
                );
                Ok::<_, AgentError>(tools)
            })
            .await?;
        Ok(tools.as_slice())
    }

    /// Validate a call against the registered definition and run it
    pub async fn dispatch(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        let tools = self.tools().await?;
        let tool = tools
            .iter()
            .find(|tool| tool.name == tool_call.name)
            .ok_or_else(|| AgentError::ToolNotFound(tool_call.name.clone()))?;
        validate_arguments(tool, &tool_call.arguments)?;

        debug!(tool = %tool_call.name, "dispatching tool call");
        self.provider.call_tool(tool_call).await
    }
}

/// Check the arguments are an object carrying every required field
fn validate_arguments(tool: &Tool, arguments: &Value) -> AgentResult<()> {
    let object = arguments.as_object().ok_or_else(|| {
        AgentError::InvalidParameters(format!("arguments for {} must be a json object", tool.name))
    })?;

    let missing: Vec<&str> = tool
        .required_arguments()
        .into_iter()
        .filter(|name| object.get(*name).map_or(true, Value::is_null))
        .collect();
    if !missing.is_empty() {
        return Err(AgentError::InvalidParameters(format!(
            "missing required arguments for {}: {}",
            tool.name,
            missing.join(", ")
        )));
    }
    Ok(())
}
