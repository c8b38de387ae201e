use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::base::{OutputSchema, Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_openai_context_length_error, messages_to_openai_spec, openai_response_to_message,
    openai_response_to_structured, output_schema_to_openai_spec, tools_to_openai_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Usage {
        let Some(usage) = data.get("usage") else {
            return Usage::default();
        };
        let count = |key: &str| usage.get(key).and_then(Value::as_i64).map(|v| v as i32);

        let input_tokens = count("prompt_tokens");
        let output_tokens = count("completion_tokens");
        // Some gateways leave out the total
        let total_tokens = count("total_tokens").or_else(|| Some(input_tokens? + output_tokens?));

        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    /// Chat completion payload shared by plain and structured requests
    fn base_payload(&self, system: &str, messages: &[Message]) -> Map<String, Value> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = Map::new();
        payload.insert("model".to_string(), json!(self.config.model));
        payload.insert("messages".to_string(), json!(messages_array));
        if let Some(temp) = self.config.temperature {
            payload.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            payload.insert("max_tokens".to_string(), json!(tokens));
        }
        payload
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        let response = match response.status() {
            StatusCode::OK => response.json::<Value>().await?,
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                return Err(anyhow!("Server error: {}", status));
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(anyhow!("Request failed: {}\nBody: {}", status, body));
            }
        };

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage)> {
        let mut payload = self.base_payload(system, messages);
        if !tools.is_empty() {
            payload.insert("tools".to_string(), json!(tools_to_openai_spec(tools)?));
        }

        let response = self.post(Value::Object(payload)).await?;

        let message = openai_response_to_message(response.clone())?;
        let usage = Self::get_usage(&response);

        Ok((message, usage))
    }

    async fn complete_structured(
        &self,
        system: &str,
        messages: &[Message],
        schema: &OutputSchema,
    ) -> Result<(Value, Usage)> {
        let mut payload = self.base_payload(system, messages);
        payload.insert(
            "response_format".to_string(),
            output_schema_to_openai_spec(schema),
        );

        let response = self.post(Value::Object(payload)).await?;

        let value = openai_response_to_structured(&response)?;
        let usage = Self::get_usage(&response);

        Ok((value, usage))
    }
}
