use serde_json::json;
use tracing::debug;

use crate::errors::{TurnError, TurnResult};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::Tool;
use crate::prompt_template::{load_prompt, CHAT_PROMPT};
use crate::providers::base::Provider;

/// One chat model call with the broker tools bound. The reply may carry tool requests.
pub async fn step(
    provider: &dyn Provider,
    history: &[Message],
    tools: &[Tool],
    account_id: Option<&str>,
) -> TurnResult<Message> {
    let system = load_prompt(
        CHAT_PROMPT,
        &json!({"account_id": account_id, "tools": tools}),
    )?;

    let (mut message, usage) = provider
        .complete(&system, history, tools)
        .await
        .map_err(TurnError::Provider)?;
    // Providers only ever produce assistant replies
    message.role = Role::Assistant;

    debug!(
        tool_requests = message.tool_requests().len(),
        total_tokens = ?usage.total_tokens,
        "chat step"
    );
    Ok(message)
}
