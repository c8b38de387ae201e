use super::{base::Provider, configs::ProviderConfig, openai::OpenAiProvider};
use anyhow::Result;
use strum_macros::{Display, EnumIter};

#[derive(EnumIter, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    OpenAi,
    OpenRouter,
}

impl ProviderConfig {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderConfig::OpenAi(_) => ProviderType::OpenAi,
            ProviderConfig::OpenRouter(_) => ProviderType::OpenRouter,
        }
    }
}

pub fn get_provider(config: ProviderConfig) -> Result<Box<dyn Provider + Send + Sync>> {
    match config {
        ProviderConfig::OpenAi(openai_config) | ProviderConfig::OpenRouter(openai_config) => {
            Ok(Box::new(OpenAiProvider::new(openai_config)?))
        }
    }
}
