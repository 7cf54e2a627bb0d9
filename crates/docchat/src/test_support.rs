//! Deterministic in-process providers for unit tests

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, FragmentStream, LlmProvider};
use crate::types::PromptMessage;

/// Embeds text as counts of vocabulary words plus a constant bias dimension
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
    pub batch_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
            batch_calls: AtomicUsize::new(0),
            single_calls: AtomicUsize::new(0),
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut vector: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32)
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Embedder whose every call fails
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::embedding("rate limited"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Replies with fixed fragments and records the messages it was given
pub struct ScriptedLlm {
    fragments: Vec<String>,
    fail_after: Option<usize>,
    pub calls: AtomicUsize,
    /// Fragments the consumer has pulled from any stream so far
    pub pulled: Arc<AtomicUsize>,
    pub last_messages: parking_lot::Mutex<Vec<PromptMessage>>,
}

impl ScriptedLlm {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            fail_after: None,
            calls: AtomicUsize::new(0),
            pulled: Arc::new(AtomicUsize::new(0)),
            last_messages: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Emit `count` fragments, then a generation error
    pub fn failing_after(fragments: &[&str], count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::new(fragments)
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn stream(&self, messages: &[PromptMessage]) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock() = messages.to_vec();

        let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        if let Some(count) = self.fail_after {
            items.truncate(count);
            items.push(Err(Error::generation("connection reset")));
        }
        let pulled = Arc::clone(&self.pulled);
        Ok(stream::iter(items)
            .inspect(move |_| {
                pulled.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

pub fn keyword_embedder(vocabulary: &[&str]) -> Arc<KeywordEmbedder> {
    Arc::new(KeywordEmbedder::new(vocabulary))
}
