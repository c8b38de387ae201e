use std::collections::HashMap;
use tracing::info;

use super::structured_failure;
use crate::errors::{TurnError, TurnResult};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::routing::RoutingDecision;
use crate::prompt_template::{load_prompt, ROUTER_PROMPT};
use crate::providers::base::{OutputSchema, Provider};

pub const ROUTING_SCHEMA_NAME: &str = "routing_decision";

/// Decide whether the latest user message is a chat or a strategy to analyze
pub async fn classify(provider: &dyn Provider, history: &[Message]) -> TurnResult<RoutingDecision> {
    match history.last() {
        None => {
            return Err(TurnError::InvalidHistory(
                "cannot route an empty conversation".to_string(),
            ))
        }
        Some(last) if last.role != Role::User => {
            return Err(TurnError::InvalidHistory(format!(
                "last message is from {:?}, expected the user",
                last.role
            )))
        }
        Some(_) => {}
    }

    let system = load_prompt(ROUTER_PROMPT, &HashMap::<String, String>::new())?;
    let schema = OutputSchema::new(ROUTING_SCHEMA_NAME, RoutingDecision::schema());
    let (value, usage) = provider
        .complete_structured(&system, history, &schema)
        .await
        .map_err(|e| structured_failure(e, TurnError::Classification))?;

    let decision: RoutingDecision = serde_json::from_value(value.clone())
        .map_err(|e| TurnError::Classification(format!("{}: {}", e, value)))?;
    info!(intent = %decision.intent, total_tokens = ?usage.total_tokens, "routed turn");
    Ok(decision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::routing::Intent;
    use crate::providers::mock::MockProvider;
    use serde_json::json;

    #[tokio::test]
    async fn test_classify_chat_exemplars() {
        let exemplars = [
            "Какая цена Сбербанка?",
            "Покажи мой портфель",
            "Отмени заявку 42",
        ];
        for text in exemplars {
            let provider = MockProvider::default().with_structured(vec![json!({"intent": "chat"})]);
            let decision = classify(&provider, &[Message::user().with_text(text)])
                .await
                .unwrap();
            assert_eq!(decision.intent, Intent::Chat);
            assert_eq!(
                provider.calls()[0].schema.as_deref(),
                Some(ROUTING_SCHEMA_NAME)
            );
        }
    }

    #[tokio::test]
    async fn test_classify_strategy() {
        let provider =
            MockProvider::default().with_structured(vec![json!({"intent": "analyze_strategy"})]);
        let decision = classify(
            &provider,
            &[Message::user().with_text("Проверь стратегию пересечения скользящих средних")],
        )
        .await
        .unwrap();
        assert_eq!(decision.intent, Intent::AnalyzeStrategy);
    }

    #[tokio::test]
    async fn test_unknown_intent_is_a_classification_error() {
        let provider =
            MockProvider::default().with_structured(vec![json!({"intent": "analyze_straregy"})]);
        let err = classify(&provider, &[Message::user().with_text("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Classification(_)));
    }

    #[tokio::test]
    async fn test_free_text_is_a_classification_error() {
        let provider = MockProvider::default().with_structured(vec![json!("chat")]);
        let err = classify(&provider, &[Message::user().with_text("hi")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "classification");
    }

    #[tokio::test]
    async fn test_history_must_end_with_user() {
        let provider = MockProvider::default();
        let err = classify(&provider, &[]).await.unwrap_err();
        assert!(matches!(err, TurnError::InvalidHistory(_)));

        let history = vec![
            Message::user().with_text("hi"),
            Message::assistant().with_text("hello"),
        ];
        let err = classify(&provider, &history).await.unwrap_err();
        assert!(matches!(err, TurnError::InvalidHistory(_)));
        assert!(provider.calls().is_empty());
    }
}
