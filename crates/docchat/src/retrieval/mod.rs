//! Vector index and similarity search

mod index;

pub use index::{cosine_similarity, SearchResult, VectorIndex};
