use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, RetrievalSettings};
use crate::core::security::{init_api_token, ApiToken};
use crate::llm::{GeminiProvider, LlmProvider};
use crate::retrieval::SessionRegistry;

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Contains the configuration and paths, the bulk-endpoint token, the LLM
/// provider, the bounded session registry, and the resolved retrieval
/// settings.
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub api_token: ApiToken,
    pub provider: Arc<dyn LlmProvider>,
    pub registry: SessionRegistry,
    pub retrieval: RetrievalSettings,
}

impl AppState {
    /// Initializes the application state: paths and configuration first,
    /// then the provider and the session registry derived from them.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());

        let retrieval = config
            .retrieval()
            .map_err(|e| InitializationError::Config(e.into()))?;
        let server_settings = config
            .server()
            .map_err(|e| InitializationError::Config(e.into()))?;
        let llm_settings = config
            .llm()
            .map_err(|e| InitializationError::Llm(e.into()))?;

        let api_token = init_api_token(server_settings.api_token);
        let provider: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(llm_settings));

        let registry = SessionRegistry::new(
            retrieval.session_capacity,
            retrieval.session_idle,
            retrieval.persist_dir.clone(),
            provider.embedding_model().to_string(),
        );

        let health_probe = provider.clone();
        tokio::spawn(async move {
            match health_probe.health_check().await {
                Ok(true) => {}
                _ => tracing::warn!("LLM provider is not reachable at startup"),
            }
        });

        Ok(Arc::new(AppState {
            paths,
            config,
            api_token,
            provider,
            registry,
            retrieval,
        }))
    }
}
