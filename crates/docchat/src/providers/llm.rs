//! LLM provider trait for streamed answer generation

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::PromptMessage;

/// Lazy, finite, non-restartable sequence of answer fragments
///
/// Concatenating the `Ok` items in order gives the answer. An `Err` item means
/// the answer was truncated; fragments before it stay valid. Dropping the
/// stream cancels generation.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Trait for LLM-based answer generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (`/api/chat`)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Start streaming a reply to role-tagged messages
    async fn stream(&self, messages: &[PromptMessage]) -> Result<FragmentStream>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
