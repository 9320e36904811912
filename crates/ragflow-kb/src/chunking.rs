//! Loads documents and splits them into overlapping chunks

use async_trait::async_trait;
use std::path::Path;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

use crate::data::{Chunk, KbError};
use crate::traits::DocumentChunker;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const PDF_MAGIC: &[u8] = b"%PDF";

/// Chunker for PDF and plain-text documents.
///
/// PDFs are recognised by their `%PDF` header or a `.pdf` extension and go
/// through text extraction. Anything else must be UTF-8 text. Chunk sizes are
/// measured in characters, and consecutive chunks share up to `overlap` of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, KbError> {
        let chunker = Self { chunk_size, overlap };
        chunker.splitter()?;
        Ok(chunker)
    }

    fn splitter(&self) -> Result<TextSplitter<text_splitter::Characters>, KbError> {
        if self.chunk_size == 0 {
            return Err(KbError::ValidationError("chunk size must be positive".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(KbError::ValidationError(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.overlap, self.chunk_size
            )));
        }
        let config = ChunkConfig::new(self.chunk_size)
            .with_overlap(self.overlap)
            .map_err(|e| KbError::ValidationError(format!("invalid chunk overlap: {}", e)))?;
        Ok(TextSplitter::new(config))
    }

    pub fn split_text(&self, text: &str) -> Result<Vec<Chunk>, KbError> {
        Ok(self
            .splitter()?
            .chunks(text)
            .filter(|piece| !piece.trim().is_empty())
            .enumerate()
            .map(|(index, piece)| Chunk::new(index, piece))
            .collect())
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String, KbError> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| KbError::ChunkingError(format!("PDF extraction task failed: {}", e)))?
        .map_err(|e| KbError::ChunkingError(format!("Failed to extract text from PDF: {}", e)))
}

fn utf8_text(path: &Path, bytes: Vec<u8>) -> Result<String, KbError> {
    String::from_utf8(bytes)
        .map_err(|_| KbError::ChunkingError(format!("{} is not UTF-8 text", path.display())))
}

/// Text content of the document at `path`
pub async fn load_document(path: &Path) -> Result<String, KbError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| KbError::IoError(format!("{}: {}", path.display(), e)))?;

    if bytes.starts_with(PDF_MAGIC) {
        return extract_pdf_text(bytes).await;
    }

    if has_pdf_extension(path) {
        // A .pdf name without a PDF header is treated as text when it decodes
        if let Ok(text) = std::str::from_utf8(&bytes) {
            return Ok(text.to_string());
        }
        return extract_pdf_text(bytes).await;
    }

    utf8_text(path, bytes)
}

#[async_trait]
impl DocumentChunker for TextChunker {
    async fn chunk(&self, path: &Path) -> Result<Vec<Chunk>, KbError> {
        let text = load_document(path).await?;
        let chunks = self.split_text(&text)?;
        debug!(path = %path.display(), chunks = chunks.len(), "Document chunked");
        Ok(chunks)
    }
}
