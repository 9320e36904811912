use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateEmbeddingRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::data::KbError;
use crate::traits::{AnswerGenerator, AnswerRequest, EmbeddingGenerator};

/// Connection settings for an OpenAI-compatible API.
///
/// `api_base` points the clients at any compatible gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub api_base: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            embedding_model: "text-embedding-3-large".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl OpenAiSettings {
    fn client(&self) -> Client<OpenAIConfig> {
        let mut config = OpenAIConfig::new().with_api_key(self.api_key.clone());
        if let Some(base) = &self.api_base {
            config = config.with_api_base(base.clone());
        }
        Client::with_config(config)
    }
}

/// API error types the provider uses for overload and rate limiting
const RETRYABLE_API_TYPES: &[&str] = &["server_error", "rate_limit_exceeded", "requests", "tokens"];

fn is_retryable_status(status: Option<u16>) -> bool {
    matches!(status, Some(429) | Some(500..=599))
}

fn is_retryable_api_type(kind: Option<&str>) -> bool {
    kind.is_some_and(|kind| RETRYABLE_API_TYPES.contains(&kind))
}

/// Maps a provider error to [`KbError::ModelUnavailable`] when retrying can
/// help, and to `permanent` otherwise.
fn provider_error(error: OpenAIError, permanent: fn(String) -> KbError) -> KbError {
    match error {
        OpenAIError::Reqwest(e) => {
            let message = format!("HTTP error: {}", e);
            let status = e.status().map(|s| s.as_u16());
            if e.is_timeout() || e.is_connect() || is_retryable_status(status) {
                KbError::ModelUnavailable(message)
            } else {
                permanent(message)
            }
        }
        OpenAIError::ApiError(e) => {
            let message = format!("API error: {}", e.message);
            if is_retryable_api_type(e.r#type.as_deref()) {
                KbError::ModelUnavailable(message)
            } else {
                permanent(message)
            }
        }
        other => permanent(other.to_string()),
    }
}

pub struct OpenAiEmbeddingGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbeddingGenerator {
    pub fn new(settings: &OpenAiSettings) -> Self {
        Self {
            client: settings.client(),
            model: settings.embedding_model.clone(),
        }
    }
}

#[async_trait]
impl EmbeddingGenerator for OpenAiEmbeddingGenerator {
    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KbError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()
            .map_err(|e| provider_error(e, KbError::EmbeddingError))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| provider_error(e, KbError::EmbeddingError))?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        if data.len() != texts.len() {
            return Err(KbError::EmbeddingError(format!(
                "expected {} embeddings, provider returned {}",
                texts.len(),
                data.len()
            )));
        }

        debug!("Embedded texts");
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

pub struct OpenAiAnswerGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiAnswerGenerator {
    pub fn new(settings: &OpenAiSettings) -> Self {
        Self {
            client: settings.client(),
            model: settings.chat_model.clone(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiAnswerGenerator {
    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn generate(&self, request: &AnswerRequest) -> Result<String, KbError> {
        let build_error = |e: OpenAIError| provider_error(e, KbError::GenerationError);

        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(request.system_instruction.clone())
            .build()
            .map_err(build_error)?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(request.prompt.clone())
            .build()
            .map_err(build_error)?;

        let chat = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([system.into(), user.into()])
            .temperature(request.temperature)
            .max_tokens(u16::try_from(request.max_output_tokens).unwrap_or(u16::MAX))
            .build()
            .map_err(build_error)?;

        let response = self.client.chat().create(chat).await.map_err(build_error)?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| KbError::GenerationError("model returned no answer".to_string()))?;

        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_overload_statuses_are_retryable() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(Some(status)), "{}", status);
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!is_retryable_status(Some(status)), "{}", status);
        }
        assert!(!is_retryable_status(None));
    }

    #[test]
    fn test_only_capacity_api_errors_are_retryable() {
        assert!(is_retryable_api_type(Some("server_error")));
        assert!(is_retryable_api_type(Some("rate_limit_exceeded")));
        assert!(!is_retryable_api_type(Some("invalid_request_error")));
        assert!(!is_retryable_api_type(Some("insufficient_quota")));
        assert!(!is_retryable_api_type(None));
    }

    #[test]
    fn test_request_errors_are_permanent() {
        let err = provider_error(
            OpenAIError::InvalidArgument("model is required".to_string()),
            KbError::EmbeddingError,
        );
        assert!(matches!(&err, KbError::EmbeddingError(m) if m.contains("model is required")));
        assert!(!err.is_transient());

        let err = provider_error(
            OpenAIError::InvalidArgument("messages are empty".to_string()),
            KbError::GenerationError,
        );
        assert!(matches!(err, KbError::GenerationError(_)));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transient() {
        let settings = OpenAiSettings {
            api_key: "test".to_string(),
            api_base: Some("http://127.0.0.1:1/v1".to_string()),
            ..OpenAiSettings::default()
        };

        let err = OpenAiEmbeddingGenerator::new(&settings)
            .embed(&["hello".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, KbError::ModelUnavailable(_)), "got {:?}", err);
        assert!(err.is_transient());
    }
}
