use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::info;
use tradechat::assistant::{load_reference_docs, Assistant};
use tradechat::broker::FinamClient;
use tradechat::graph::Orchestrator;
use tradechat::providers::base::Provider;
use tradechat::providers::factory;
use tradechat::session::{default_session_dir, FileSessionStore, MemorySessionStore, SessionStore};
use tradechat::tools::broker::BrokerTools;
use tradechat::tools::remote::RemoteToolProvider;
use tradechat::tools::{ToolProvider, ToolRegistry};

use crate::configuration::{Settings, ToolsSettings};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    /// Served over `/mcp`; the same registry the assistant's chat agent uses
    pub tools: Arc<ToolRegistry>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        sessions: Arc<dyn SessionStore>,
        reference_docs: String,
        max_tool_rounds: usize,
    ) -> Self {
        let orchestrator = Orchestrator::new(provider, tools.clone())
            .with_reference_docs(reference_docs)
            .with_max_tool_rounds(max_tool_rounds);
        Self {
            assistant: Arc::new(Assistant::new(orchestrator, sessions)),
            tools,
        }
    }

    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let provider_config = settings.provider.into_config();
        info!(provider = %provider_config.provider_type(), "configuring provider");
        let provider: Box<dyn Provider> = factory::get_provider(provider_config)?;

        let tool_provider: Arc<dyn ToolProvider> = match settings.tools {
            ToolsSettings::Local => {
                let token = settings
                    .broker
                    .access_token
                    .ok_or_else(|| anyhow!("broker access token is required for local tools"))?;
                Arc::new(BrokerTools::new(FinamClient::new(
                    settings.broker.base_url,
                    token,
                )?))
            }
            ToolsSettings::Remote { url } => Arc::new(RemoteToolProvider::new(url)?),
        };
        info!(tools = tool_provider.name(), "configuring tools");

        let sessions: Arc<dyn SessionStore> = if settings.sessions.memory {
            Arc::new(MemorySessionStore::new())
        } else {
            let dir = match settings.sessions.dir {
                Some(dir) => dir,
                None => default_session_dir()?,
            };
            info!(dir = %dir.display(), "storing sessions on disk");
            Arc::new(FileSessionStore::new(dir))
        };

        let reference_docs = load_reference_docs(settings.assistant.docs_path.as_deref()).await?;

        Ok(Self::new(
            Arc::from(provider),
            Arc::new(ToolRegistry::new(tool_provider)),
            sessions,
            reference_docs,
            settings.assistant.max_tool_rounds,
        ))
    }
}
