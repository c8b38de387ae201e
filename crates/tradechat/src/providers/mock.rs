use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{OutputSchema, Provider, StructuredOutputError, Usage};

/// One request the mock received, kept for assertions
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub schema: Option<String>,
}

#[derive(Default)]
struct MockState {
    completions: VecDeque<Message>,
    structured: VecDeque<Value>,
    calls: Vec<RecordedCall>,
}

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of chat responses
    pub fn new(responses: Vec<Message>) -> Self {
        let provider = Self::default();
        provider.lock().completions.extend(responses);
        provider
    }

    /// Queue structured answers, returned in order by `complete_structured`.
    /// A value that is not a json object is reported as malformed output.
    pub fn with_structured(self, values: Vec<Value>) -> Self {
        self.lock().structured.extend(values);
        self
    }

    /// Every request received so far, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            system: system.to_string(),
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
            schema: None,
        });
        // Return empty response if no more pre-configured responses
        let message = state
            .completions
            .pop_front()
            .unwrap_or_else(|| Message::assistant().with_text(""));
        Ok((message, Usage::default()))
    }

    async fn complete_structured(
        &self,
        system: &str,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<(Value, Usage)> {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            system: system.to_string(),
            messages: messages.to_vec(),
            tool_names: Vec::new(),
            schema: Some(schema.name.clone()),
        });
        let value = state
            .structured
            .pop_front()
            .ok_or_else(|| anyhow!("no structured response configured"))?;
        if !value.is_object() {
            return Err(StructuredOutputError(value.to_string()).into());
        }
        Ok((value, Usage::default()))
    }
}
