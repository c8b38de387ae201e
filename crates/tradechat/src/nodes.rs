//! The steps of a turn. Each node makes exactly one model call.

pub mod chat;
pub mod codegen;
pub mod planner;
pub mod router;

use crate::errors::TurnError;
use crate::providers::base::StructuredOutputError;

/// Split a structured call failure into "the model answered badly", mapped
/// with `malformed`, and everything else, which is a provider failure.
fn structured_failure(err: anyhow::Error, malformed: fn(String) -> TurnError) -> TurnError {
    match err.downcast::<StructuredOutputError>() {
        Ok(StructuredOutputError(output)) => malformed(output),
        Err(err) => TurnError::Provider(err),
    }
}
