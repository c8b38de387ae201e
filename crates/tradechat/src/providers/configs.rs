pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const OPENROUTER_HOST: &str = "https://openrouter.ai/api";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    OpenRouter(OpenAiProviderConfig),
}

// OpenRouter speaks the openai chat completions protocol, so both share one config
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl OpenAiProviderConfig {
    pub fn new<H: Into<String>, K: Into<String>>(host: H, api_key: K) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
        }
    }
}
