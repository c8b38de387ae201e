use crate::state::AppState;
use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde_json::Value;
use tracing::{debug, warn};
use tradechat::tools::rpc::{self, RpcRequest, RpcResponse, PARSE_ERROR};

/// JSON-RPC tool service over the assistant's own registry
async fn mcp(State(state): State<AppState>, body: Bytes) -> Json<RpcResponse> {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "unparseable rpc request");
            return Json(RpcResponse::failure(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {}", err),
            ));
        }
    };
    debug!(method = %request.method, "rpc request");
    Json(rpc::handle(&state.tools, request).await)
}

pub fn routes(state: AppState) -> Router {
    Router::new().route("/mcp", post(mcp)).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;
    use tradechat::errors::AgentError;
    use tradechat::models::tool::Tool;
    use tradechat::providers::mock::MockProvider;
    use tradechat::session::MemorySessionStore;
    use tradechat::tools::mock::MockToolProvider;
    use tradechat::tools::rpc::METHOD_NOT_FOUND;
    use tradechat::tools::ToolRegistry;

    fn app() -> Router {
        let tools = MockToolProvider::new()
            .with_tool(
                Tool::new(
                    "get_quote",
                    "Latest quote",
                    json!({"type": "object", "required": ["symbol"]}),
                ),
                Ok(json!({"symbol": "SBER@MISX", "last": "300.50"})),
            )
            .with_tool(
                Tool::new("get_exchanges", "Exchanges", json!({"type": "object"})),
                Err(AgentError::ExecutionError("HTTP 401".to_string())),
            );
        let state = AppState::new(
            Arc::new(MockProvider::default()),
            Arc::new(ToolRegistry::new(Arc::new(tools))),
            Arc::new(MemorySessionStore::new()),
            String::new(),
            4,
        );
        routes(state)
    }

    async fn call(body: String) -> RpcResponse {
        let request = Request::builder()
            .uri("/mcp")
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_list_tools() {
        let response = call(json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string()).await;
        assert_eq!(response.id, json!(1));
        let names: Vec<&str> = response.result.as_ref().unwrap()["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["get_quote", "get_exchanges"]);
    }

    #[tokio::test]
    async fn test_call_tool() {
        let response = call(
            json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": {"name": "get_quote", "arguments": {"symbol": "SBER@MISX"}}
            })
            .to_string(),
        )
        .await;
        let result = response.result.unwrap();
        assert_eq!(result["isError"], false);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("300.50"));
    }

    #[tokio::test]
    async fn test_tool_failure_is_a_result() {
        let response = call(
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {"name": "get_exchanges"}
            })
            .to_string(),
        )
        .await;
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("HTTP 401"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let response = call("{not json".to_string()).await;
        assert_eq!(response.error.unwrap().code, PARSE_ERROR);
        assert_eq!(response.id, Value::Null);

        let response =
            call(json!({"jsonrpc": "2.0", "id": 4, "method": "tools/remove"}).to_string()).await;
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }
}
