use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::errors::{TurnError, TurnResult};
use crate::graph::Orchestrator;
use crate::models::code::Code;
use crate::models::message::Message;
use crate::session::SessionStore;
use crate::state::ConversationState;

/// One inbound user message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
}

impl TurnRequest {
    /// A request whose session is keyed by the account id
    pub fn for_account(message: impl Into<String>, account_id: impl Into<String>) -> Self {
        let account_id = account_id.into();
        Self {
            message: message.into(),
            session_id: account_id.clone(),
            account_id: Some(account_id),
        }
    }
}

/// The assistant's answer to one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Code>,
}

/// Entry point for turns: loads the session, runs the graph and persists the
/// result. Nothing is written when the turn fails.
pub struct Assistant {
    orchestrator: Orchestrator,
    sessions: Arc<dyn SessionStore>,
}

impl Assistant {
    pub fn new(orchestrator: Orchestrator, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            orchestrator,
            sessions,
        }
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> TurnResult<TurnResponse> {
        let session_id = request.session_id.as_str();
        let history = self
            .sessions
            .load(session_id)
            .await
            .map_err(TurnError::Session)?;
        info!(session_id, history = history.len(), "starting turn");

        let mut state = ConversationState::new(history).with_account(request.account_id.clone());
        state.push(Message::user().with_text(request.message.as_str()));

        if let Err(err) = self.orchestrator.run(&mut state).await {
            error!(session_id, kind = err.kind(), error = %err, "turn failed");
            return Err(err);
        }

        let response = match state.artifact().cloned() {
            Some(code) => {
                let text = code.to_markdown();
                state.push(Message::assistant().with_text(text.as_str()));
                TurnResponse {
                    text,
                    code: Some(code),
                }
            }
            None => TurnResponse {
                text: state.last().map(Message::text).unwrap_or_default(),
                code: None,
            },
        };

        self.sessions
            .save(session_id, state.messages())
            .await
            .map_err(TurnError::Session)?;
        Ok(response)
    }
}

/// Reference documentation handed to the code generator. A missing path means no docs.
pub async fn load_reference_docs(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => Ok(tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read reference docs {}: {}", path.display(), e)
        })?),
        None => Ok(String::new()),
    }
}
