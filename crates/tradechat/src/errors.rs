use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures of a single tool invocation. These never end a turn, they are
/// shown to the model as the tool's output.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failures that abort a turn. Nothing is persisted when one of these is returned.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Could not classify the request: {0}")]
    Classification(String),

    #[error("Generated code did not match the expected schema: {0}")]
    GenerationSchema(String),

    #[error("Model provider failed: {0}")]
    Provider(#[source] anyhow::Error),

    #[error("Tools are unavailable: {0}")]
    ToolsUnavailable(AgentError),

    #[error("Invalid conversation history: {0}")]
    InvalidHistory(String),

    #[error("Tool loop exceeded {0} rounds")]
    ToolLoopExceeded(usize),

    #[error("No transition {0}")]
    InvalidTransition(String),

    #[error("Session storage failed: {0}")]
    Session(#[source] anyhow::Error),

    #[error("Failed to render prompt: {0}")]
    Prompt(#[from] tera::Error),
}

impl TurnError {
    /// Stable short name, used in logs and http error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::Classification(_) => "classification",
            TurnError::GenerationSchema(_) => "generation_schema",
            TurnError::Provider(_) => "provider",
            TurnError::ToolsUnavailable(_) => "tools_unavailable",
            TurnError::InvalidHistory(_) => "invalid_history",
            TurnError::ToolLoopExceeded(_) => "tool_loop_exceeded",
            TurnError::InvalidTransition(_) => "invalid_transition",
            TurnError::Session(_) => "session",
            TurnError::Prompt(_) => "prompt",
        }
    }
}

pub type TurnResult<T> = Result<T, TurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_error_kinds() {
        assert_eq!(
            TurnError::Classification("free text".to_string()).kind(),
            "classification"
        );
        assert_eq!(TurnError::ToolLoopExceeded(16).kind(), "tool_loop_exceeded");
        assert_eq!(
            TurnError::ToolsUnavailable(AgentError::Internal("down".to_string())).to_string(),
            "Tools are unavailable: Internal error: down"
        );
    }

    #[test]
    fn test_agent_error_round_trips_through_history() {
        let err = AgentError::InvalidParameters("missing symbol".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(serde_json::from_str::<AgentError>(&json).unwrap(), err);
    }
}
