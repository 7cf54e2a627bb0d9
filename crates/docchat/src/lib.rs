//! docchat: chat with an uploaded document
//!
//! An upload is loaded (plain text or PDF), split into overlapping character
//! windows, embedded, and kept in an in-memory vector index owned by a
//! session. Questions against that session retrieve the closest passages and
//! stream a grounded answer from the language model.
//!
//! Embeddings and generation go through the [`providers::EmbeddingProvider`]
//! and [`providers::LlmProvider`] traits; Ollama is the bundled backend.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod sessions;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use ingestion::{DocumentLoader, IngestPipeline, TextChunker};
pub use pipeline::{PipelineOutput, RetrievalPipeline};
pub use retrieval::{SearchResult, VectorIndex};
pub use sessions::{Session, SessionRegistry};
pub use types::{Chunk, Document, FileType, PromptMessage, Role};
