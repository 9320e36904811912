//! Deterministic in-process collaborators for workflow tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::data::{Chunk, KbError, SearchResult, VectorRecord};
use crate::storage::InMemoryVectorStore;
use crate::traits::{AnswerGenerator, AnswerRequest, DocumentChunker, EmbeddingGenerator, VectorStore};

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Bag-of-words embedder: texts sharing words get similar vectors.
#[derive(Debug)]
pub struct HashingEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let slot = (fnv1a(&word.to_lowercase()) % self.dimension as u64) as usize;
            vector[slot] += 1.0;
        }
        vector
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingGenerator for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Fails with a transient error for the first `failures` calls, then delegates
pub struct FlakyEmbedder {
    inner: HashingEmbedder,
    failures: usize,
    attempts: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(dimension: usize, failures: usize) -> Self {
        Self {
            inner: HashingEmbedder::new(dimension),
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingGenerator for FlakyEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(KbError::ModelUnavailable("503 Service Unavailable".to_string()));
        }
        self.inner.embed(texts).await
    }
}

/// Returns the same chunks for every document and records which paths were read
#[derive(Debug, Default)]
pub struct StaticChunker {
    chunks: Vec<String>,
    reads: Mutex<Vec<PathBuf>>,
}

impl StaticChunker {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn reads(&self) -> Vec<PathBuf> {
        self.reads.lock().clone()
    }
}

#[async_trait]
impl DocumentChunker for StaticChunker {
    async fn chunk(&self, path: &Path) -> Result<Vec<Chunk>, KbError> {
        self.reads.lock().push(path.to_path_buf());
        Ok(self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk::new(i, text.clone()))
            .collect())
    }
}

/// Answers with a fixed string and keeps every request it saw
#[derive(Debug, Default)]
pub struct RecordingAnswerGenerator {
    answer: String,
    requests: Mutex<Vec<AnswerRequest>>,
}

impl RecordingAnswerGenerator {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AnswerRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AnswerGenerator for RecordingAnswerGenerator {
    async fn generate(&self, request: &AnswerRequest) -> Result<String, KbError> {
        self.requests.lock().push(request.clone());
        Ok(self.answer.clone())
    }
}

/// In-memory store that counts calls per operation
#[derive(Clone)]
pub struct CountingVectorStore {
    inner: InMemoryVectorStore,
    upserts: Arc<AtomicUsize>,
    deletes: Arc<Mutex<Vec<String>>>,
    searches: Arc<AtomicUsize>,
}

impl CountingVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: InMemoryVectorStore::new(dimension),
            upserts: Arc::new(AtomicUsize::new(0)),
            deletes: Arc::new(Mutex::new(Vec::new())),
            searches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn inner(&self) -> &InMemoryVectorStore {
        &self.inner
    }

    pub fn upsert_calls(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Isolation keys passed to `delete_by_isolation_key`, in call order
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deletes.lock().clone()
    }
}

#[async_trait]
impl VectorStore for CountingVectorStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize, KbError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(records).await
    }

    async fn delete_by_isolation_key(&self, isolation_key: &str) -> Result<(), KbError> {
        self.deletes.lock().push(isolation_key.to_string());
        self.inner.delete_by_isolation_key(isolation_key).await
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        isolation_key: &str,
    ) -> Result<SearchResult, KbError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(query_vector, top_k, isolation_key).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}
