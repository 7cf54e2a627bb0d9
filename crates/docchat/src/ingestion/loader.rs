//! Plain-text and PDF loading

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Document, FileType};

/// Upper bound for a single pdf-extract run; some fonts make it spin
const PDF_EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Ligature glyphs that PDF fonts commonly emit in place of letter pairs
const LIGATURES: &[(char, &str)] = &[
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Loads `.txt` and `.pdf` files into documents
pub struct DocumentLoader;

impl DocumentLoader {
    /// Load a file from disk, taking the format from its extension
    pub fn load_path(path: impl AsRef<Path>) -> Result<Vec<Document>> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        // Reject by extension before touching the filesystem
        Self::file_type(&filename)?;

        let data = std::fs::read(path).map_err(|e| Error::load(&filename, e.to_string()))?;
        Self::load_bytes(&filename, &data)
    }

    /// Load uploaded bytes, taking the format from the declared filename
    pub fn load_bytes(filename: &str, data: &[u8]) -> Result<Vec<Document>> {
        match Self::file_type(filename)? {
            FileType::Txt => Self::load_text(filename, data),
            FileType::Pdf => Self::load_pdf(filename, data),
        }
    }

    /// Resolve the declared format or fail with `UnsupportedFormat`
    pub fn file_type(filename: &str) -> Result<FileType> {
        FileType::from_filename(filename).ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "{} (only .txt and .pdf files are supported)",
                filename
            ))
        })
    }

    /// Plain text yields exactly one document
    fn load_text(filename: &str, data: &[u8]) -> Result<Vec<Document>> {
        let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::load(filename, format!("invalid UTF-8: {}", e)))?;

        Ok(vec![Document::new(filename, text)])
    }

    /// One document per page that has text, so chunks never straddle pages
    fn load_pdf(filename: &str, data: &[u8]) -> Result<Vec<Document>> {
        let documents = match lopdf::Document::load_mem(data) {
            Ok(pdf) => Self::pages_from_lopdf(filename, &pdf),
            Err(e) => {
                tracing::warn!("lopdf could not open {}: {}, trying pdf-extract", filename, e);
                Vec::new()
            }
        };

        if !documents.is_empty() {
            tracing::debug!("Extracted {} pages with text from {}", documents.len(), filename);
            return Ok(documents);
        }

        let text = clean_pdf_text(&Self::extract_pdf_with_timeout(filename, data)?);
        if text.trim().is_empty() {
            return Err(Error::load(
                filename,
                "PDF has no extractable text (it may be scanned or encrypted)",
            ));
        }

        Ok(vec![Document::new(filename, text)])
    }

    fn pages_from_lopdf(filename: &str, pdf: &lopdf::Document) -> Vec<Document> {
        let mut documents = Vec::new();

        for page_number in pdf.get_pages().keys() {
            match pdf.extract_text(&[*page_number]) {
                Ok(text) => {
                    let text = clean_pdf_text(&text);
                    if !text.trim().is_empty() {
                        documents.push(Document::new(
                            format!("{}#page={}", filename, page_number),
                            text,
                        ));
                    }
                }
                Err(e) => {
                    tracing::debug!("No text for page {} of {}: {}", page_number, filename, e);
                }
            }
        }

        documents
    }

    /// Whole-document extraction with pdf-extract, bounded by a timeout
    fn extract_pdf_with_timeout(filename: &str, data: &[u8]) -> Result<String> {
        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(PDF_EXTRACT_TIMEOUT) {
            Ok(Ok(text)) => {
                let _ = handle.join();
                Ok(text)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(Error::load(filename, format!("failed to parse PDF: {}", e)))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // The thread cannot be killed; it is left to finish on its own
                tracing::error!("PDF extraction timed out after {:?}", PDF_EXTRACT_TIMEOUT);
                Err(Error::load(filename, "PDF extraction timed out"))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("PDF extraction thread crashed");
                Err(Error::load(filename, "PDF extraction failed"))
            }
        }
    }
}

/// Drop null characters and expand ligature glyphs
fn clean_pdf_text(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\0' {
            continue;
        }
        match LIGATURES.iter().find(|(glyph, _)| *glyph == c) {
            Some((_, expanded)) => cleaned.push_str(expanded),
            None => cleaned.push(c),
        }
    }
    cleaned
}
