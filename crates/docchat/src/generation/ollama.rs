//! Ollama HTTP client for embeddings and streamed chat generation

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::providers::llm::FragmentStream;
use crate::types::PromptMessage;

/// Upper bound on the delay between embedding retries
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Ollama API client
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: LlmConfig,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

/// One NDJSON line of a streamed `/api/chat` response
#[derive(Debug, Deserialize)]
struct ChatStreamLine {
    #[serde(default)]
    message: Option<ChatStreamMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    ///
    /// Only connecting is bounded client-wide. Streamed chat bodies may take
    /// as long as the model needs; other requests carry their own timeout.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < max_retries => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt + 1,
                        max_retries + 1,
                        e,
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Check if Ollama is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self
            .client
            .get(&url)
            .timeout(self.request_timeout())
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed a single text
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::embedding("Empty embedding response"))
    }

    /// Embed texts in order, `embed_batch_size` texts per request
    ///
    /// Any failed request fails the whole call.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.config.embed_batch_size.max(1)) {
            let vectors = self.retry_request(|| self.embed_request(batch)).await?;
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    fn embed_request_builder(&self, texts: &[String]) -> RequestBuilder {
        let url = format!("{}/api/embed", self.config.base_url);
        let request = EmbedRequest {
            model: &self.config.embed_model,
            input: texts,
        };

        self.client
            .post(&url)
            .timeout(self.request_timeout())
            .json(&request)
    }

    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .embed_request_builder(texts)
            .send()
            .await
            .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "Embedding failed: HTTP {} - {}",
                status, body
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embedding response: {}", e)))?;

        if embed_response.embeddings.len() != texts.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embed_response.embeddings.len()
            )));
        }

        Ok(embed_response.embeddings)
    }

    /// Start a streamed chat completion
    ///
    /// Dropping the returned stream drops the HTTP response and frees the
    /// connection.
    pub async fn chat_stream(&self, messages: &[PromptMessage]) -> Result<FragmentStream> {
        tracing::debug!("Streaming chat with model: {}", self.config.generate_model);

        let response = self
            .chat_request_builder(messages)
            .send()
            .await
            .map_err(|e| Error::generation(format!("Stream request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "Stream failed: HTTP {} - {}",
                status, body
            )));
        }

        Ok(decode_chat_stream(response.bytes_stream()))
    }

    fn chat_request_builder(&self, messages: &[PromptMessage]) -> RequestBuilder {
        let url = format!("{}/api/chat", self.config.base_url);
        let request = ChatRequest {
            model: &self.config.generate_model,
            messages,
            stream: true,
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        };

        self.client.post(&url).json(&request)
    }
}

/// Exponential backoff from 500ms, capped at `MAX_BACKOFF`
fn backoff_delay(attempt: u32) -> Duration {
    let millis = 500u64.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(millis).min(MAX_BACKOFF)
}

struct DecodeState {
    bytes: BoxStream<'static, std::result::Result<Bytes, String>>,
    buffer: Vec<u8>,
    finished: bool,
}

enum LineOutcome {
    Skip,
    Fragment(String),
    Last(Option<String>),
}

/// Turn an NDJSON byte stream from `/api/chat` into answer fragments
///
/// Lines may arrive split across network chunks. The stream ends after the
/// line with `done: true`; ending without it is a generation error.
pub(crate) fn decode_chat_stream<S, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display,
{
    let state = DecodeState {
        bytes: bytes.map(|chunk| chunk.map_err(|e| e.to_string())).fuse().boxed(),
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                match parse_line(&line) {
                    Ok(LineOutcome::Skip) => continue,
                    Ok(LineOutcome::Fragment(text)) => return Some((Ok(text), state)),
                    Ok(LineOutcome::Last(text)) => {
                        state.finished = true;
                        match text {
                            Some(text) => return Some((Ok(text), state)),
                            None => return None,
                        }
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                }
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(Error::generation(format!("Stream error: {}", e))), state));
                }
                None if state.buffer.iter().all(u8::is_ascii_whitespace) => {
                    state.finished = true;
                    return Some((
                        Err(Error::generation("Stream ended before completion")),
                        state,
                    ));
                }
                // Last line had no trailing newline
                None => state.buffer.push(b'\n'),
            }
        }
    })
    .boxed()
}

fn parse_line(line: &[u8]) -> Result<LineOutcome> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(LineOutcome::Skip);
    }

    let parsed: ChatStreamLine = serde_json::from_str(line)
        .map_err(|e| Error::generation(format!("Malformed stream line: {}", e)))?;

    if let Some(error) = parsed.error {
        return Err(Error::generation(error));
    }

    let content = parsed
        .message
        .map(|m| m.content)
        .filter(|content| !content.is_empty());

    Ok(match (content, parsed.done) {
        (content, true) => LineOutcome::Last(content),
        (Some(content), false) => LineOutcome::Fragment(content),
        (None, false) => LineOutcome::Skip,
    })
}
