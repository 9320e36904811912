//! DocumentChunker trait definition

use async_trait::async_trait;
use std::path::Path;

use crate::data::{Chunk, KbError};

/// Reads a document and splits it into ordered chunks.
/// A document without extractable text yields no chunks.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait DocumentChunker: Send + Sync {
    async fn chunk(&self, path: &Path) -> Result<Vec<Chunk>, KbError>;
}
