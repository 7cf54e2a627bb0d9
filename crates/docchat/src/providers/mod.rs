//! Provider abstractions for embeddings and generation
//!
//! The core only talks to these two capability traits; the Ollama
//! implementations are the default backend.

pub mod embedding;
pub mod llm;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use llm::{FragmentStream, LlmProvider};
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
