use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use strum_macros::Display;
use tracing::{debug, info, warn};

use crate::errors::{AgentResult, TurnError, TurnResult};
use crate::models::content::Content;
use crate::models::message::{Message, ToolRequest};
use crate::models::routing::Intent;
use crate::nodes::{chat, codegen, planner, router};
use crate::providers::base::Provider;
use crate::state::ConversationState;
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Node {
    Router,
    ChatAgent,
    ToolExecution,
    Planner,
    CodeGenerator,
    Done,
}

/// What a node reports when it finishes, used to pick the next node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Intent(Intent),
    HasPendingToolCalls(bool),
    Completed,
}

const TRANSITIONS: &[(Node, Signal, Node)] = &[
    (Node::Router, Signal::Intent(Intent::Chat), Node::ChatAgent),
    (
        Node::Router,
        Signal::Intent(Intent::AnalyzeStrategy),
        Node::Planner,
    ),
    (
        Node::ChatAgent,
        Signal::HasPendingToolCalls(true),
        Node::ToolExecution,
    ),
    (
        Node::ChatAgent,
        Signal::HasPendingToolCalls(false),
        Node::Done,
    ),
    (Node::ToolExecution, Signal::Completed, Node::ChatAgent),
    (Node::Planner, Signal::Completed, Node::CodeGenerator),
    (Node::CodeGenerator, Signal::Completed, Node::Done),
];

pub fn next(node: Node, signal: Signal) -> Option<Node> {
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == node && *on == signal)
        .map(|(_, _, to)| *to)
}

/// Runs one turn through the graph, from the router to done
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    registry: Arc<ToolRegistry>,
    reference_docs: String,
    max_tool_rounds: usize,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn Provider>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            registry,
            reference_docs: String::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_reference_docs(mut self, reference_docs: impl Into<String>) -> Self {
        self.reference_docs = reference_docs.into();
        self
    }

    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    pub async fn run(&self, state: &mut ConversationState) -> TurnResult<()> {
        let started = Instant::now();
        let mut node = Node::Router;
        let mut tool_rounds = 0;

        while node != Node::Done {
            debug!(%node, "entering node");
            let signal = self.visit(node, state, &mut tool_rounds).await?;
            node = next(node, signal).ok_or_else(|| {
                TurnError::InvalidTransition(format!("from {} on {:?}", node, signal))
            })?;
        }

        info!(
            tool_rounds,
            messages = state.messages().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn finished"
        );
        Ok(())
    }

    async fn visit(
        &self,
        node: Node,
        state: &mut ConversationState,
        tool_rounds: &mut usize,
    ) -> TurnResult<Signal> {
        let provider = self.provider.as_ref();
        match node {
            Node::Router => {
                let decision = router::classify(provider, state.messages()).await?;
                state.set_decision(decision);
                Ok(Signal::Intent(decision.intent))
            }
            Node::ChatAgent => {
                debug_assert!(
                    state.unresolved_tool_requests().is_empty(),
                    "chat agent invoked with unanswered tool requests"
                );
                let tools = self
                    .registry
                    .tools()
                    .await
                    .map_err(TurnError::ToolsUnavailable)?;
                let reply =
                    chat::step(provider, state.messages(), tools, state.account_id()).await?;
                let pending = reply.has_tool_requests();
                state.push(reply);
                Ok(Signal::HasPendingToolCalls(pending))
            }
            Node::ToolExecution => {
                *tool_rounds += 1;
                if *tool_rounds > self.max_tool_rounds {
                    warn!(max = self.max_tool_rounds, "tool loop limit reached");
                    return Err(TurnError::ToolLoopExceeded(self.max_tool_rounds));
                }
                self.execute_tools(state).await;
                Ok(Signal::Completed)
            }
            Node::Planner => {
                let plan = planner::plan(provider, state.messages()).await?;
                state.push(plan);
                Ok(Signal::Completed)
            }
            Node::CodeGenerator => {
                let code =
                    codegen::generate(provider, state.messages(), &self.reference_docs).await?;
                state.set_artifact(code);
                Ok(Signal::Completed)
            }
            Node::Done => Ok(Signal::Completed),
        }
    }

    /// Run every pending request concurrently and append one tool message per
    /// request, in request order. Failures become the message's content.
    async fn execute_tools(&self, state: &mut ConversationState) {
        let requests = state.pending_tool_requests();
        let results = join_all(requests.iter().map(|request| self.dispatch(request))).await;

        for (request, result) in requests.into_iter().zip(results) {
            match &result {
                Ok(_) => debug!(call_id = %request.id, "tool call succeeded"),
                Err(err) => warn!(call_id = %request.id, error = %err, "tool call failed"),
            }
            state.push(Message::tool().with_tool_response(request.id, result));
        }
    }

    async fn dispatch(&self, request: &ToolRequest) -> AgentResult<Vec<Content>> {
        let tool_call = request.tool_call.clone()?;
        debug!(call_id = %request.id, tool = %tool_call.name, "running tool");
        self.registry.dispatch(tool_call).await
    }
}
