//! Document and chunk types

use serde::{Deserialize, Serialize};

/// Supported upload formats
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Plain text file
    Txt,
    /// PDF document
    Pdf,
}

impl FileType {
    /// Detect file type from a filename's extension (case-insensitive)
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, extension) = filename.rsplit_once('.')?;
        Self::from_extension(extension)
    }

    /// Detect file type from an extension without the leading dot
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" => Some(Self::Txt),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// A unit of loaded text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Where the text came from (filename, or `file.pdf#page=3`)
    pub source: String,
    /// Extracted text
    pub text: String,
}

impl Document {
    /// Create a new document
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// A bounded window over a document's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source of the owning document
    pub source: String,
    /// Chunk text
    pub text: String,
    /// Position in the overall chunk sequence
    pub index: usize,
    /// Start offset in the document, in characters
    pub char_start: usize,
    /// End offset in the document, in characters (exclusive)
    pub char_end: usize,
}

impl Chunk {
    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.char_end - self.char_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_filename("notes.TXT"), Some(FileType::Txt));
        assert_eq!(FileType::from_filename("paper.pdf"), Some(FileType::Pdf));
        assert_eq!(FileType::from_filename("report.docx"), None);
        assert_eq!(FileType::from_filename("README"), None);
    }
}
