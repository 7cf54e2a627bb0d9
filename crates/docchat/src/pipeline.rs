//! Retrieval-augmented answer pipeline
//!
//! One query runs exactly one index search and one generation call:
//! search the session's index, join the top passages into a context block,
//! wrap it with the question in a system + user prompt, then stream the
//! provider's fragments back untouched.

use futures::StreamExt;
use std::sync::Arc;

use crate::error::Result;
use crate::generation::PromptBuilder;
use crate::providers::{FragmentStream, LlmProvider};
use crate::retrieval::{SearchResult, VectorIndex};

/// Default number of passages placed into the prompt
pub const DEFAULT_TOP_K: usize = 4;

/// Output of one pipeline run
pub struct PipelineOutput {
    /// Answer fragments in provider order
    pub response: FragmentStream,
    /// Passages the answer was grounded on, best first
    pub context: Vec<SearchResult>,
}

impl std::fmt::Debug for PipelineOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOutput")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Binds one document's index to a generation provider
pub struct RetrievalPipeline {
    index: VectorIndex,
    llm: Arc<dyn LlmProvider>,
    top_k: usize,
}

impl RetrievalPipeline {
    /// Create a pipeline retrieving `DEFAULT_TOP_K` passages per query
    pub fn new(index: VectorIndex, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            index,
            llm,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Override the number of retrieved passages
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Retrieve context for `question` and start streaming the answer
    pub async fn run(&self, question: &str) -> Result<PipelineOutput> {
        let context = self.index.search(question, self.top_k).await?;

        tracing::debug!(
            "Retrieved {} passages (best score {:.3}) for query",
            context.len(),
            context.first().map(|r| r.score).unwrap_or(0.0)
        );

        let context_block = PromptBuilder::build_context(&context);
        let messages = PromptBuilder::build_messages(question, &context_block);
        let response = self.llm.stream(&messages).await?;

        Ok(PipelineOutput { response, context })
    }

    /// Run to completion and return the concatenated answer
    pub async fn answer(&self, question: &str) -> Result<String> {
        let PipelineOutput { mut response, .. } = self.run(question).await?;

        let mut answer = String::new();
        while let Some(fragment) = response.next().await {
            answer.push_str(&fragment?);
        }
        Ok(answer)
    }

    /// The index this pipeline searches
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}
