//! Core types for documents, prompts and client messages

pub mod document;
pub mod message;
pub mod response;

pub use document::{Chunk, Document, FileType};
pub use message::{PromptMessage, Role};
pub use response::{ChatEvent, ChatRequest, QueryRequest, QueryResponse, UploadResponse};
