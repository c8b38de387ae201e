use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// A named JSON schema the model's answer must conform to
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub schema: Value,
}

impl OutputSchema {
    pub fn new<S: Into<String>>(name: S, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// The model answered, but not with a json object we can use
#[derive(Debug, thiserror::Error)]
#[error("Structured output was not valid: {0}")]
pub struct StructuredOutputError(pub String);

/// Base trait for AI providers (OpenAI, OpenRouter, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message, optionally letting the model request tool calls
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)>;

    /// Generate a json value constrained to `schema`. No tools are bound.
    ///
    /// Returns a [`StructuredOutputError`] inside the anyhow error when the model's
    /// answer is not a json object, so callers can tell it apart from transport failures.
    async fn complete_structured(
        &self,
        system: &str,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<(Value, Usage)>;
}
