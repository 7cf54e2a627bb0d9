//! Document ingestion: loading, chunking and index construction

pub mod chunker;
mod loader;
mod processor;

pub use chunker::{split, TextChunker};
pub use loader::DocumentLoader;
pub use processor::IngestPipeline;
