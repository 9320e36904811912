use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A piece of document text, numbered in reading order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// Payload stored next to each vector. `source` holds the isolation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: RecordPayload,
}

/// Chunk texts found by a search, best match first, with the distinct sources they came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub contexts: Vec<String>,
    pub sources: Vec<String>,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Collects ranked payloads, skipping empty texts and de-duplicating sources
    pub fn from_payloads<I>(payloads: I) -> Self
    where
        I: IntoIterator<Item = RecordPayload>,
    {
        let mut result = Self::empty();
        for payload in payloads {
            if payload.text.is_empty() {
                continue;
            }
            result.contexts.push(payload.text);
            if !result.sources.contains(&payload.source) {
                result.sources.push(payload.source);
            }
        }
        result
    }
}

/// Cosine similarity of two vectors of equal length; zero when either is the zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
