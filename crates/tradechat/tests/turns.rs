use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tradechat::assistant::{Assistant, TurnRequest};
use tradechat::broker::FinamClient;
use tradechat::errors::{AgentError, TurnError};
use tradechat::graph::Orchestrator;
use tradechat::models::message::{Message, MessageContent};
use tradechat::models::role::Role;
use tradechat::models::tool::{Tool, ToolCall};
use tradechat::providers::configs::OpenAiProviderConfig;
use tradechat::providers::mock::MockProvider;
use tradechat::providers::openai::OpenAiProvider;
use tradechat::session::{MemorySessionStore, SessionStore};
use tradechat::tools::broker::BrokerTools;
use tradechat::tools::mock::MockToolProvider;
use tradechat::tools::ToolRegistry;

fn completion(message: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    }))
}

fn quote_tools() -> MockToolProvider {
    MockToolProvider::new()
        .with_tool(
            Tool::new(
                "get_quote",
                "Latest quote",
                json!({
                    "type": "object",
                    "properties": {"symbol": {"type": "string"}},
                    "required": ["symbol"]
                }),
            ),
            Ok(json!({"symbol": "SBER@MISX", "quote": {"last": {"value": "300.50"}}})),
        )
        .with_tool(
            Tool::new("get_exchanges", "Exchanges", json!({"type": "object"})),
            Ok(json!({"exchanges": [{"mic": "MISX", "name": "Moscow Exchange"}]})),
        )
}

fn assistant_with(
    provider: MockProvider,
    tools: MockToolProvider,
    sessions: Arc<MemorySessionStore>,
) -> Assistant {
    let registry = Arc::new(ToolRegistry::new(Arc::new(tools)));
    let orchestrator =
        Orchestrator::new(Arc::new(provider), registry).with_reference_docs("Finam TradeAPI docs");
    Assistant::new(orchestrator, sessions)
}

#[tokio::test]
async fn test_sberbank_price_end_to_end() {
    let llm = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"response_format": {"type": "json_schema"}})))
        .respond_with(completion(
            json!({"role": "assistant", "content": "{\"intent\": \"chat\"}"}),
        ))
        .up_to_n_times(1)
        .mount(&llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_quote",
                "type": "function",
                "function": {"name": "get_quote", "arguments": "{\"symbol\": \"SBER@MISX\"}"}
            }]
        })))
        .up_to_n_times(1)
        .mount(&llm)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion(json!({
            "role": "assistant",
            "content": "Последняя цена Сбербанка (SBER@MISX): 300.50 ₽"
        })))
        .mount(&llm)
        .await;

    let broker = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/instruments/SBER@MISX/quotes/latest"))
        .and(header("Authorization", "broker-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbol": "SBER@MISX",
            "quote": {"last": {"value": "300.50"}}
        })))
        .expect(1)
        .mount(&broker)
        .await;

    let provider = OpenAiProvider::new(OpenAiProviderConfig::new(llm.uri(), "llm-key")).unwrap();
    let tools = BrokerTools::new(FinamClient::new(broker.uri(), "broker-token").unwrap());
    let sessions = Arc::new(MemorySessionStore::new());
    let assistant = Assistant::new(
        Orchestrator::new(
            Arc::new(provider),
            Arc::new(ToolRegistry::new(Arc::new(tools))),
        ),
        sessions.clone(),
    );

    let response = assistant
        .handle_turn(TurnRequest::for_account("Какая цена Сбербанка?", "A1"))
        .await
        .unwrap();

    assert_eq!(
        response.text,
        "Последняя цена Сбербанка (SBER@MISX): 300.50 ₽"
    );
    assert!(response.code.is_none());

    let history = sessions.load("A1").await.unwrap();
    let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    assert_eq!(history[2].tool_call_id(), Some("call_quote"));

    // The final chat request carried the tool output back to the model
    let requests = llm.received_requests().await.unwrap();
    let last: serde_json::Value = requests.last().unwrap().body_json().unwrap();
    let tool_message = last["messages"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["role"] == "tool")
        .unwrap();
    assert_eq!(tool_message["tool_call_id"], "call_quote");
    assert!(tool_message["content"].as_str().unwrap().contains("300.50"));
}

#[tokio::test]
async fn test_moving_average_crossover_produces_code() {
    let provider = MockProvider::new(vec![Message::assistant().with_text(
        "Load daily candles for SBER@MISX via get_candles, compute SMA 20 and SMA 50, \
         go long when SMA 20 crosses above SMA 50, report CAGR, volatility, VaR, Sharpe \
         and equity curve smoothness.",
    )])
    .with_structured(vec![
        json!({"intent": "analyze_strategy"}),
        json!({
            "description": "SMA 20/50 crossover backtest on SBER@MISX",
            "imports": "import pandas as pd\nimport requests",
            "code": "fast = close.rolling(20).mean()\nslow = close.rolling(50).mean()"
        }),
    ]);
    let sessions = Arc::new(MemorySessionStore::new());
    let assistant = assistant_with(provider.clone(), quote_tools(), sessions.clone());

    let response = assistant
        .handle_turn(TurnRequest::for_account(
            "Оцени стратегию: покупать SBER, когда SMA 20 пересекает SMA 50 снизу вверх",
            "A1",
        ))
        .await
        .unwrap();

    let code = response.code.expect("strategy turn returns code");
    assert!(!code.code.is_empty());
    assert!(response.text.contains("```python"));

    // user, plan, rendered artifact
    let history = sessions.load("A1").await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[2].text().contains("rolling(20)"));

    let calls = provider.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].schema.as_deref(), Some("routing_decision"));
    assert_eq!(calls[1].schema, None);
    assert_eq!(calls[2].schema.as_deref(), Some("code"));
    assert_eq!(
        calls[2].messages.last().unwrap().text(),
        "docs: Finam TradeAPI docs"
    );
}

#[tokio::test]
async fn test_every_tool_request_gets_exactly_one_response() {
    let provider = MockProvider::new(vec![
        Message::assistant()
            .with_tool_request(
                "call_1",
                Ok(ToolCall::new("get_quote", json!({"symbol": "SBER@MISX"}))),
            )
            .with_tool_request("call_2", Ok(ToolCall::new("get_exchanges", json!({}))))
            .with_tool_request(
                "call_3",
                Ok(ToolCall::new("get_quote", json!({"symbol": "GAZP@MISX"}))),
            ),
        Message::assistant().with_text("Готово"),
    ])
    .with_structured(vec![json!({"intent": "chat"})]);
    let sessions = Arc::new(MemorySessionStore::new());
    let assistant = assistant_with(provider, quote_tools(), sessions.clone());

    assistant
        .handle_turn(TurnRequest::for_account("Сравни SBER и GAZP", "A1"))
        .await
        .unwrap();

    let history = sessions.load("A1").await.unwrap();
    let requested: Vec<&str> = history
        .iter()
        .flat_map(|m| m.tool_requests())
        .map(|r| r.id.as_str())
        .collect();
    let answered: Vec<&str> = history.iter().filter_map(|m| m.tool_call_id()).collect();

    assert_eq!(requested, answered);
    let unique: HashSet<_> = answered.iter().collect();
    assert_eq!(unique.len(), answered.len());
}

#[tokio::test]
async fn test_empty_arguments_do_not_break_the_turn() {
    let provider = MockProvider::new(vec![
        Message::assistant().with_tool_request("call_1", Ok(ToolCall::new("get_quote", json!({})))),
        Message::assistant().with_tool_request(
            "call_2",
            Err(AgentError::ToolNotFound("get_weather".to_string())),
        ),
        Message::assistant().with_text("Уточните, пожалуйста, тикер."),
    ])
    .with_structured(vec![json!({"intent": "chat"})]);
    let sessions = Arc::new(MemorySessionStore::new());
    let tools = quote_tools();
    let assistant = assistant_with(provider, tools, sessions.clone());

    let response = assistant
        .handle_turn(TurnRequest::for_account("Какая цена?", "A1"))
        .await
        .unwrap();
    assert_eq!(response.text, "Уточните, пожалуйста, тикер.");

    let history = sessions.load("A1").await.unwrap();
    let failures: Vec<String> = history
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.content[0].as_tool_response_text())
        .collect();
    assert_eq!(failures.len(), 2);
    assert!(failures[0].contains("symbol"));
    assert!(failures[1].contains("get_weather"));
}

#[tokio::test]
async fn test_code_generation_twice_gives_valid_code() {
    for _ in 0..2 {
        let provider = MockProvider::new(vec![Message::assistant().with_text("plan")])
            .with_structured(vec![
                json!({"intent": "analyze_strategy"}),
                json!({"description": "d", "imports": "import numpy as np", "code": "x = 1"}),
            ]);
        let assistant = assistant_with(
            provider,
            quote_tools(),
            Arc::new(MemorySessionStore::new()),
        );
        let response = assistant
            .handle_turn(TurnRequest::for_account("SMA crossover", "A1"))
            .await
            .unwrap();
        let code = response.code.unwrap();
        assert!(!code.description.is_empty());
        assert!(!code.imports.is_empty());
        assert!(!code.code.is_empty());
    }
}

#[tokio::test]
async fn test_failed_turn_persists_nothing() {
    let sessions = Arc::new(MemorySessionStore::new());
    let earlier = vec![
        Message::user().with_text("Привет"),
        Message::assistant().with_text("Здравствуйте!"),
    ];
    sessions.save("A1", &earlier).await.unwrap();

    let provider = MockProvider::default().with_structured(vec![json!(["not", "an", "object"])]);
    let assistant = assistant_with(provider, quote_tools(), sessions.clone());

    let err = assistant
        .handle_turn(TurnRequest::for_account("Какая цена Сбербанка?", "A1"))
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::Classification(_)));
    assert_eq!(sessions.load("A1").await.unwrap(), earlier);
}

#[tokio::test]
async fn test_malformed_code_fails_the_turn() {
    let sessions = Arc::new(MemorySessionStore::new());
    let provider = MockProvider::new(vec![Message::assistant().with_text("plan")])
        .with_structured(vec![
            json!({"intent": "analyze_strategy"}),
            json!({"description": "d", "code": "x = 1", "language": "python"}),
        ]);
    let assistant = assistant_with(provider, quote_tools(), sessions.clone());

    let err = assistant
        .handle_turn(TurnRequest::for_account("SMA crossover", "A1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "generation_schema");
    assert!(sessions.load("A1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_follow_up_chat_sees_the_artifact() {
    let sessions = Arc::new(MemorySessionStore::new());
    let provider = MockProvider::new(vec![
        Message::assistant().with_text("plan"),
        Message::assistant().with_text("Скрипт использует SMA 20 и SMA 50."),
    ])
    .with_structured(vec![
        json!({"intent": "analyze_strategy"}),
        json!({"description": "SMA crossover", "imports": "import pandas as pd", "code": "x = 1"}),
        json!({"intent": "chat"}),
    ]);
    let assistant = assistant_with(provider.clone(), quote_tools(), sessions.clone());

    assistant
        .handle_turn(TurnRequest::for_account("SMA crossover", "A1"))
        .await
        .unwrap();
    assistant
        .handle_turn(TurnRequest::for_account("Что делает скрипт?", "A1"))
        .await
        .unwrap();

    let calls = provider.calls();
    let chat_call = calls.last().unwrap();
    let saw_artifact = chat_call.messages.iter().any(|m| {
        m.content
            .iter()
            .any(|c| matches!(c, MessageContent::Text(t) if t.text.contains("```python")))
    });
    assert!(saw_artifact);
}
