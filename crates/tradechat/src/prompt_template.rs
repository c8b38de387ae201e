use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

pub const CHAT_PROMPT: &str = include_str!("prompts/chat.md");
pub const ROUTER_PROMPT: &str = include_str!("prompts/router.md");
pub const PLANNER_PROMPT: &str = include_str!("prompts/planner.md");
pub const CODEGEN_PROMPT: &str = include_str!("prompts/codegen.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::Tool;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_load_prompt() {
        let template = "Account {{ account_id }} on {{ exchange }}";
        let mut context = HashMap::new();
        context.insert("account_id", "A1");
        context.insert("exchange", "MISX");

        let result = load_prompt(template, &context).unwrap();
        assert_eq!(result, "Account A1 on MISX");
    }

    #[test]
    fn test_load_prompt_missing_variable() {
        let template = "Account {{ account_id }} on {{ exchange }}";
        let mut context = HashMap::new();
        context.insert("account_id", "A1");
        assert!(load_prompt(template, &context).is_err());
    }

    #[test]
    fn test_chat_prompt_lists_tools() {
        let tools = vec![
            Tool::new("get_quote", "Latest quote", json!({"type": "object"})),
            Tool::new("get_account", "Account summary", json!({"type": "object"})),
        ];
        let rendered = load_prompt(
            CHAT_PROMPT,
            &json!({"account_id": "A1", "tools": tools}),
        )
        .unwrap();

        assert!(rendered.contains("account id is A1"));
        assert!(rendered.contains("- get_quote: Latest quote"));
        assert!(rendered.contains("- get_account: Account summary"));
    }

    #[test]
    fn test_chat_prompt_without_account() {
        let rendered =
            load_prompt(CHAT_PROMPT, &json!({"account_id": null, "tools": []})).unwrap();
        assert!(rendered.contains("has not selected an account"));
    }

    #[test]
    fn test_planner_prompt_lists_metrics() {
        let rendered = load_prompt(
            PLANNER_PROMPT,
            &json!({"metrics": ["Sharpe Ratio", "Value at Risk"]}),
        )
        .unwrap();
        assert!(rendered.contains("- Sharpe Ratio"));
        assert!(rendered.contains("- Value at Risk"));
    }

    #[test]
    fn test_static_prompts_render() {
        let empty: HashMap<String, String> = HashMap::new();
        assert!(load_prompt(ROUTER_PROMPT, &empty).unwrap().contains("analyze_strategy"));
        assert!(load_prompt(CODEGEN_PROMPT, &empty).unwrap().contains("Finam TradeAPI"));
    }
}
