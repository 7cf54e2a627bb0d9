//! Ingestion orchestration: load, chunk, embed, index

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::pipeline::{RetrievalPipeline, DEFAULT_TOP_K};
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::retrieval::VectorIndex;

use super::chunker::TextChunker;
use super::loader::DocumentLoader;

/// Turns an uploaded file into a ready-to-query retrieval pipeline
pub struct IngestPipeline {
    /// Text chunker
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    /// Passages retrieved per query by the pipelines this builds
    top_k: usize,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(
        chunker: TextChunker,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            chunker,
            embedder,
            llm,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Build from configuration, validating chunk parameters
    pub fn from_config(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        Ok(Self::new(chunker, embedder, llm).with_top_k(config.retrieval.top_k))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Full ingestion: returns the pipeline and the number of chunks indexed
    ///
    /// Nothing is kept on failure; a failed embedding batch fails the whole
    /// upload.
    pub async fn ingest(&self, filename: &str, data: Vec<u8>) -> Result<(RetrievalPipeline, usize)> {
        // Reject unsupported files before spending a blocking task on them
        DocumentLoader::file_type(filename)?;

        let chunker = self.chunker;
        let owned_name = filename.to_string();
        let chunks = tokio::task::spawn_blocking(move || {
            let documents = DocumentLoader::load_bytes(&owned_name, &data)?;
            Ok::<_, Error>(chunker.split(&documents))
        })
        .await
        .map_err(|e| Error::internal(format!("Ingestion task failed: {}", e)))??;

        tracing::info!(
            "Split {} into {} chunks (size {}, overlap {})",
            filename,
            chunks.len(),
            self.chunker.chunk_size(),
            self.chunker.overlap()
        );

        let index = VectorIndex::build(Arc::clone(&self.embedder), &chunks).await?;
        let pipeline = RetrievalPipeline::new(index, Arc::clone(&self.llm)).with_top_k(self.top_k);

        Ok((pipeline, chunks.len()))
    }
}
