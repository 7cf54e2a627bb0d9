//! Fixed-size overlapping character windows

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Text chunker with configurable size and overlap
///
/// Sizes are measured in characters (Unicode scalar values), never bytes, so a
/// window never splits a multi-byte character.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    /// Window length in characters
    chunk_size: usize,
    /// Characters shared with the previous window
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    ///
    /// Fails with `InvalidConfiguration` unless `0 <= overlap < chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than zero"));
        }
        if overlap >= chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between the starts of consecutive windows
    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Split documents in order, left to right within each document
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            self.split_into(doc, &mut chunks);
        }
        chunks
    }

    fn split_into(&self, doc: &Document, chunks: &mut Vec<Chunk>) {
        if doc.text.is_empty() {
            return;
        }

        // Byte offset of every character boundary, including the end
        let boundaries: Vec<usize> = doc
            .text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(doc.text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        let mut start = 0usize;
        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            chunks.push(Chunk {
                source: doc.source.clone(),
                text: doc.text[boundaries[start]..boundaries[end]].to_string(),
                index: chunks.len(),
                char_start: start,
                char_end: end,
            });

            // Full windows continue until the remainder is shorter than one
            if char_count - start < self.chunk_size {
                break;
            }
            start += self.step();
        }
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Split documents with the given window parameters
pub fn split(documents: &[Document], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Chunk>> {
    Ok(TextChunker::new(chunk_size, chunk_overlap)?.split(documents))
}
