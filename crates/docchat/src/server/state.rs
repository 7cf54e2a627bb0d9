//! Application state for the chat server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::ingestion::IngestPipeline;
use crate::providers::{EmbeddingProvider, LlmProvider, OllamaProvider};
use crate::sessions::SessionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Live sessions, one per upload
    sessions: Arc<SessionRegistry>,
    /// Builds pipelines from uploads
    ingest: IngestPipeline,
    /// Embedding provider
    embedding_provider: Arc<dyn EmbeddingProvider>,
    /// LLM provider
    llm_provider: Arc<dyn LlmProvider>,
}

impl AppState {
    /// Create state backed by the configured Ollama server
    pub fn new(config: RagConfig) -> Result<Self> {
        let (embedder, llm) = OllamaProvider::new(&config.llm)?.split();
        tracing::info!(
            "Ollama providers initialized (embeddings: {}, generation: {})",
            config.llm.embed_model,
            config.llm.generate_model
        );
        Self::with_providers(config, Arc::new(embedder), Arc::new(llm))
    }

    /// Create state with explicit providers
    pub fn with_providers(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm_provider: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let ingest = IngestPipeline::from_config(
            &config,
            Arc::clone(&embedding_provider),
            Arc::clone(&llm_provider),
        )?;
        let sessions = Arc::new(SessionRegistry::from_config(&config.sessions));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                sessions,
                ingest,
                embedding_provider,
                llm_provider,
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the session registry
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.inner.sessions
    }

    pub fn ingest(&self) -> &IngestPipeline {
        &self.inner.ingest
    }

    /// Get embedding provider
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedding_provider
    }

    /// Get LLM provider
    pub fn llm_provider(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm_provider
    }
}
