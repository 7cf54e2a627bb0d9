//! Request and response bodies exchanged with clients

use serde::{Deserialize, Serialize};

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Id to use for subsequent queries
    pub session_id: String,
    /// Uploaded filename
    pub filename: String,
    /// Number of chunks indexed
    pub chunk_count: usize,
}

/// Synchronous query request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub query: String,
    /// Session created by a previous upload
    pub session_id: String,
}

/// Synchronous query response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Full concatenated answer
    pub response: String,
}

/// Inbound message on the chat socket
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: String,
}

/// Outbound message on the chat socket
///
/// Serializes as `{"chunk": "..."}`, `{"done": true}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatEvent {
    /// One answer fragment
    Chunk(String),
    /// End of one answer (always `true`)
    Done(bool),
    /// Query failed; terminal for that query only
    Error(String),
}

impl ChatEvent {
    /// End-of-answer marker
    pub fn done() -> Self {
        Self::Done(true)
    }

    /// Whether this event ends the current query
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk(_))
    }

    /// Serialize to the wire representation
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            // Plain strings and bools always serialize
            Err(_) => r#"{"error":"serialization failed"}"#.to_string(),
        }
    }
}
