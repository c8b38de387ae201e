use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::ToolProvider;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::{Tool, ToolCall};

/// A tool provider with canned answers per tool name, for tests
#[derive(Default)]
pub struct MockToolProvider {
    tools: Vec<Tool>,
    responses: HashMap<String, AgentResult<Value>>,
    failing_lists: AtomicUsize,
    list_count: AtomicUsize,
    calls: Mutex<Vec<ToolCall>>,
}

impl MockToolProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool and the result every call to it produces
    pub fn with_tool(mut self, tool: Tool, response: AgentResult<Value>) -> Self {
        self.responses.insert(tool.name.clone(), response);
        self.tools.push(tool);
        self
    }

    /// Make the first `count` listings fail
    pub fn failing_lists(self, count: usize) -> Self {
        self.failing_lists.store(count, Ordering::SeqCst);
        self
    }

    /// How many times the tool list was requested
    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }

    /// Calls received so far, in arrival order
    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolProvider for MockToolProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_tools(&self) -> AgentResult<Vec<Tool>> {
        self.list_count.fetch_add(1, Ordering::SeqCst);
        // Yield so concurrent callers overlap with the load in progress
        tokio::task::yield_now().await;

        let remaining = self.failing_lists.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_lists.store(remaining - 1, Ordering::SeqCst);
            return Err(AgentError::Internal("tool service unavailable".to_string()));
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, tool_call: ToolCall) -> AgentResult<Vec<Content>> {
        self.calls.lock().unwrap().push(tool_call.clone());
        match self.responses.get(&tool_call.name) {
            Some(Ok(value)) => Ok(vec![Content::json(value)]),
            Some(Err(err)) => Err(err.clone()),
            None => Err(AgentError::ToolNotFound(tool_call.name)),
        }
    }
}
