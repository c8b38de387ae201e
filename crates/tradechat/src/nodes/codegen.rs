use std::collections::HashMap;
use tracing::info;

use super::structured_failure;
use crate::errors::{TurnError, TurnResult};
use crate::models::code::Code;
use crate::models::message::Message;
use crate::prompt_template::{load_prompt, CODEGEN_PROMPT};
use crate::providers::base::{OutputSchema, Provider};

pub const CODE_SCHEMA_NAME: &str = "code";

/// Write the strategy script. The reference docs are sent as a trailing user
/// message and are not part of the returned history.
pub async fn generate(
    provider: &dyn Provider,
    history: &[Message],
    reference_docs: &str,
) -> TurnResult<Code> {
    let system = load_prompt(CODEGEN_PROMPT, &HashMap::<String, String>::new())?;

    let mut messages = history.to_vec();
    messages.push(Message::user().with_text(format!("docs: {}", reference_docs)));

    let schema = OutputSchema::new(CODE_SCHEMA_NAME, Code::schema());
    let (value, usage) = provider
        .complete_structured(&system, &messages, &schema)
        .await
        .map_err(|e| structured_failure(e, TurnError::GenerationSchema))?;

    let code: Code = serde_json::from_value(value.clone())
        .map_err(|e| TurnError::GenerationSchema(format!("{}: {}", e, value)))?;
    info!(
        code_len = code.code.len(),
        total_tokens = ?usage.total_tokens,
        "generated strategy script"
    );
    Ok(code)
}
