use std::collections::HashSet;

use crate::models::code::Code;
use crate::models::message::{Message, ToolRequest};
use crate::models::role::Role;
use crate::models::routing::RoutingDecision;

/// Everything one turn works on: the history so far, the routing decision and
/// the generated artifact. History only ever grows.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    account_id: Option<String>,
    decision: Option<RoutingDecision>,
    artifact: Option<Code>,
}

impl ConversationState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_account(mut self, account_id: Option<String>) -> Self {
        self.account_id = account_id;
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn decision(&self) -> Option<RoutingDecision> {
        self.decision
    }

    /// Record the routing decision. It is made once per turn.
    pub fn set_decision(&mut self, decision: RoutingDecision) {
        debug_assert!(self.decision.is_none(), "routing decision already made");
        self.decision = Some(decision);
    }

    pub fn artifact(&self) -> Option<&Code> {
        self.artifact.as_ref()
    }

    pub fn set_artifact(&mut self, code: Code) {
        debug_assert!(self.artifact.is_none(), "artifact already generated");
        self.artifact = Some(code);
    }

    /// Tool requests of the latest message, when it is an assistant message asking for tools
    pub fn pending_tool_requests(&self) -> Vec<ToolRequest> {
        match self.messages.last() {
            Some(message) if message.role == Role::Assistant => {
                message.tool_requests().into_iter().cloned().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Ids of tool requests anywhere in history with no tool message answering them
    pub fn unresolved_tool_requests(&self) -> Vec<&str> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter_map(Message::tool_call_id)
            .collect();
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.tool_requests())
            .map(|request| request.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
