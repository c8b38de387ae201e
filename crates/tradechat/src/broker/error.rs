use serde_json::{json, Value};
use thiserror::Error;

use crate::errors::AgentError;

/// Every way a broker request can fail. All of them render to the same json
/// shape, see [`BrokerError::to_payload`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("HTTP {status_code}: {message}")]
    Http {
        status_code: u16,
        message: String,
        details: Option<Value>,
    },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl BrokerError {
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::Http { .. } => "http",
            BrokerError::Transport(_) => "transport",
            BrokerError::Decode(_) => "decode",
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            BrokerError::Http { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// `{"error", "kind", "status_code", "details"}`, the last two null when unknown
    pub fn to_payload(&self) -> Value {
        let details = match self {
            BrokerError::Http { details, .. } => details.clone(),
            _ => None,
        };
        json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "status_code": self.status_code(),
            "details": details,
        })
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BrokerError::Decode(err.to_string())
        } else {
            BrokerError::Transport(err.to_string())
        }
    }
}

impl From<BrokerError> for AgentError {
    fn from(err: BrokerError) -> Self {
        AgentError::ExecutionError(err.to_payload().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_payload() {
        let err = BrokerError::Http {
            status_code: 404,
            message: "Not Found".to_string(),
            details: Some(json!({"code": 5, "message": "instrument not found"})),
        };
        assert_eq!(
            err.to_payload(),
            json!({
                "error": "HTTP 404: Not Found",
                "kind": "http",
                "status_code": 404,
                "details": {"code": 5, "message": "instrument not found"}
            })
        );
    }

    #[test]
    fn test_transport_error_payload_has_null_fields() {
        let payload = BrokerError::Transport("connection refused".to_string()).to_payload();
        assert_eq!(payload["kind"], "transport");
        assert!(payload["status_code"].is_null());
        assert!(payload["details"].is_null());
    }

    #[test]
    fn test_converts_to_execution_error() {
        let err: AgentError = BrokerError::Decode("expected value".to_string()).into();
        match err {
            AgentError::ExecutionError(text) => {
                let payload: Value = serde_json::from_str(&text).unwrap();
                assert_eq!(payload["kind"], "decode");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
