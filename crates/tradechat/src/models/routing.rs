use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use strum_macros::{Display, EnumIter, EnumString};

/// What the user wants from this turn
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    /// General conversation, possibly using broker tools
    Chat,
    /// Plan and generate a strategy script
    AnalyzeStrategy,
}

/// The router's verdict for a single turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingDecision {
    pub intent: Intent,
}

impl RoutingDecision {
    pub fn new(intent: Intent) -> Self {
        Self { intent }
    }

    /// JSON schema handed to the model for structured output
    pub fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "intent": {
                    "type": "string",
                    "enum": ["chat", "analyze_strategy"],
                    "description": "chat for questions and trading actions, analyze_strategy when the user describes a trading strategy to be turned into code"
                }
            },
            "required": ["intent"],
            "additionalProperties": false
        })
    }
}
