//! In-process providers for end-to-end tests; nothing here touches the network

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docchat::config::RagConfig;
use docchat::providers::{EmbeddingProvider, FragmentStream, LlmProvider};
use docchat::server::state::AppState;
use docchat::types::{PromptMessage, Role};
use docchat::Result;

/// Bag-of-words embedder over a fixed vocabulary
pub struct VocabularyEmbedder {
    vocabulary: Vec<&'static str>,
}

impl VocabularyEmbedder {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for VocabularyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|term| lower.matches(term).count() as f32)
            .collect();
        vector.push(0.05);
        Ok(vector)
    }

    fn name(&self) -> &str {
        "vocabulary"
    }
}

/// Answers "I don't know" unless a question word appears in the context
///
/// The reply is split into word fragments the way a real model streams.
pub struct GroundedStub;

#[async_trait]
impl LlmProvider for GroundedStub {
    async fn stream(&self, messages: &[PromptMessage]) -> Result<FragmentStream> {
        let user = messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let (context, question) = user
            .split_once("\n\nQuestion:\n")
            .map(|(c, q)| (c.trim_start_matches("Context:\n").to_string(), q.trim().to_string()))
            .unwrap_or_default();

        let grounded = question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .any(|w| context.to_lowercase().contains(&w.to_lowercase()));

        let reply = if grounded {
            format!("From the document: {}", context.lines().next().unwrap_or(""))
        } else {
            "I don't know".to_string()
        };

        let fragments: Vec<Result<String>> = words(&reply).into_iter().map(Ok).collect();
        Ok(stream::iter(fragments).boxed())
    }

    fn name(&self) -> &str {
        "grounded-stub"
    }

    fn model(&self) -> &str {
        "stub"
    }
}

/// Echoes the question back slowly and records how many answers overlap
pub struct SlowEcho {
    pub active: Arc<AtomicUsize>,
    pub max_active: Arc<AtomicUsize>,
}

impl SlowEcho {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmProvider for SlowEcho {
    async fn stream(&self, messages: &[PromptMessage]) -> Result<FragmentStream> {
        let question = messages
            .last()
            .and_then(|m| m.content.split_once("Question:\n"))
            .map(|(_, q)| q.trim().to_string())
            .unwrap_or_default();

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));

        let fragments = vec!["Answer".to_string(), " to ".to_string(), question];
        let stream = stream::iter(fragments).then(move |fragment| {
            let _keep = &guard;
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, docchat::Error>(fragment)
            }
        });
        Ok(stream.boxed())
    }

    fn name(&self) -> &str {
        "slow-echo"
    }

    fn model(&self) -> &str {
        "echo"
    }
}

fn words(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut parts = text.split(' ').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_some() {
            out.push(format!("{} ", part));
        } else {
            out.push(part.to_string());
        }
    }
    out
}

pub fn state_with(llm: Arc<dyn LlmProvider>) -> AppState {
    AppState::with_providers(
        RagConfig::default(),
        Arc::new(VocabularyEmbedder::new(&["photosynthesis", "chlorophyll", "light", "water"])),
        llm,
    )
    .expect("default config is valid")
}
