use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{isolation_key_present, validate_query, validate_records};
use crate::data::{cosine_similarity, KbError, SearchResult, VectorRecord};
use crate::traits::VectorStore;

/// In-memory vector store with exact cosine ranking
#[derive(Clone)]
pub struct InMemoryVectorStore {
    records: Arc<RwLock<HashMap<Uuid, VectorRecord>>>,
    dimension: usize,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            dimension,
        }
    }

    /// Number of records stored under any key
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn contains(&self, id: &Uuid) -> bool {
        self.records.read().await.contains_key(id)
    }

    /// Number of records stored under `isolation_key`
    pub async fn count_for(&self, isolation_key: &str) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.payload.source == isolation_key)
            .count()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, KbError> {
        validate_records(&records, self.dimension)?;

        let count = records.len();
        let mut stored = self.records.write().await;
        for record in records {
            stored.insert(record.id, record);
        }
        Ok(count)
    }

    async fn delete_by_isolation_key(&self, isolation_key: &str) -> Result<(), KbError> {
        if !isolation_key_present(isolation_key, "delete") {
            return Ok(());
        }

        let mut stored = self.records.write().await;
        stored.retain(|_, r| r.payload.source != isolation_key);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        isolation_key: &str,
    ) -> Result<SearchResult, KbError> {
        if !isolation_key_present(isolation_key, "search") {
            return Ok(SearchResult::empty());
        }
        validate_query(query_vector, self.dimension)?;

        let stored = self.records.read().await;
        let mut scored: Vec<(f32, &VectorRecord)> = stored
            .values()
            .filter(|r| r.payload.source == isolation_key)
            .map(|r| (cosine_similarity(query_vector, &r.vector), r))
            .collect();
        // Ties fall back to id order so results are stable
        scored.sort_by(|(a, ra), (b, rb)| {
            b.partial_cmp(a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| ra.id.cmp(&rb.id))
        });

        Ok(SearchResult::from_payloads(
            scored
                .into_iter()
                .take(top_k)
                .map(|(_, r)| r.payload.clone()),
        ))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
