//! AnswerGenerator trait definition

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::data::KbError;

/// A single grounded-answer request to a chat model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub system_instruction: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate the answer text, trimmed of surrounding whitespace
    async fn generate(&self, request: &AnswerRequest) -> Result<String, KbError>;
}
