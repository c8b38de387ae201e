use crate::error::{to_env_var, ConfigError, ENV_PREFIX};
use config::{Config, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use tradechat::broker::client::FINAM_BASE_URL;
use tradechat::graph::DEFAULT_MAX_TOOL_ROUNDS;
use tradechat::providers::configs::{
    OpenAiProviderConfig, ProviderConfig, DEFAULT_MODEL, OPENAI_HOST, OPENROUTER_HOST,
};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// Address to bind, host names are resolved at bind time
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
    OpenRouter {
        #[serde(default = "default_openrouter_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_openrouter_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
            ProviderSettings::OpenRouter {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenRouter(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            }),
        }
    }
}

/// Where the chat agent's tools come from
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ToolsSettings {
    /// Broker tools called in process
    #[default]
    Local,
    /// A JSON-RPC tool service, e.g. another tradechatd's `/mcp`
    Remote { url: String },
}

#[derive(Debug, Deserialize)]
pub struct BrokerSettings {
    #[serde(default = "default_broker_url")]
    pub base_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            base_url: default_broker_url(),
            access_token: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssistantSettings {
    #[serde(default)]
    pub docs_path: Option<PathBuf>,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            docs_path: None,
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionSettings {
    /// Directory of the jsonl store, defaults to ~/.config/tradechat/sessions
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub memory: bool,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub tools: ToolsSettings,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub assistant: AssistantSettings,
    #[serde(default)]
    pub sessions: SessionSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Self::load()?;
        settings.validate()?;
        Ok(settings)
    }

    fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(|err| {
            tracing::debug!("Configuration error: {:?}", &err);
            if let config::ConfigError::NotFound(field) = &err {
                return ConfigError::MissingEnvVar {
                    env_var: to_env_var(field),
                };
            }
            match missing_field(&err.to_string()) {
                Some(field) => ConfigError::MissingEnvVar {
                    env_var: to_env_var(&field),
                },
                None => ConfigError::Other(err),
            }
        })
    }

    /// In-process broker tools cannot work without a token
    fn validate(&self) -> Result<(), ConfigError> {
        let has_token = self
            .broker
            .access_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty());
        if self.tools == ToolsSettings::Local && !has_token {
            return Err(ConfigError::MissingEnvVar {
                env_var: to_env_var("broker.access_token"),
            });
        }
        Ok(())
    }
}

/// Dotted path of the field named in a serde "missing field" message
fn missing_field(message: &str) -> Option<String> {
    let field = message
        .split("missing field `")
        .nth(1)?
        .split('`')
        .next()?;
    let key = message
        .split(" for key `")
        .nth(1)
        .and_then(|rest| rest.split('`').next())
        .filter(|key| !key.is_empty());
    Some(match key {
        Some(key) => format!("{}.{}", key, field),
        None => field.to_string(),
    })
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_openrouter_model() -> String {
    format!("openai/{}", DEFAULT_MODEL)
}

fn default_openai_host() -> String {
    OPENAI_HOST.to_string()
}

fn default_openrouter_host() -> String {
    OPENROUTER_HOST.to_string()
}

fn default_broker_url() -> String {
    FINAM_BASE_URL.to_string()
}

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}
