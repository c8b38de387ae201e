use serde_json::json;
use tracing::debug;

use crate::errors::{TurnError, TurnResult};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::prompt_template::{load_prompt, PLANNER_PROMPT};
use crate::providers::base::Provider;

/// Metrics every strategy description must ask the script to report
pub const STRATEGY_METRICS: [&str; 5] = [
    "Annualized Return (CAGR)",
    "Volatility",
    "Value at Risk",
    "Sharpe Ratio",
    "Equity Curve Smoothness",
];

/// Turn the user's strategy into a description of the script that evaluates it
pub async fn plan(provider: &dyn Provider, history: &[Message]) -> TurnResult<Message> {
    let system = load_prompt(PLANNER_PROMPT, &json!({"metrics": STRATEGY_METRICS}))?;
    let (mut message, usage) = provider
        .complete(&system, history, &[])
        .await
        .map_err(TurnError::Provider)?;
    message.role = Role::Assistant;

    debug!(total_tokens = ?usage.total_tokens, "planned strategy script");
    Ok(message)
}
