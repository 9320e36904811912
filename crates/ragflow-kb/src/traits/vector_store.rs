//! VectorStore trait definition

use async_trait::async_trait;

use crate::data::{KbError, SearchResult, VectorRecord};

/// Storage for embedded chunks, partitioned by isolation key.
///
/// Implementations fail closed: a search or delete with a blank isolation
/// key touches nothing and never widens to other keys.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records by id. Returns how many records were written.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, KbError>;

    /// Remove every record whose payload source equals `isolation_key`.
    /// Deleting a key with no records succeeds.
    async fn delete_by_isolation_key(&self, isolation_key: &str) -> Result<(), KbError>;

    /// The `top_k` records under `isolation_key` closest to `query_vector` by cosine similarity.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        isolation_key: &str,
    ) -> Result<SearchResult, KbError>;

    /// Length every stored and queried vector must have
    fn dimension(&self) -> usize;
}
