//! EmbeddingGenerator trait definition

use async_trait::async_trait;

use crate::data::KbError;

/// Turns text into vectors. Output order matches input order.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, KbError> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KbError::EmbeddingError("provider returned no embedding".to_string()))
    }
}
