pub mod gemini;
pub mod parse;
pub mod planner;
pub mod report;

use crate::retry::Retryable;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("GEMINI_API_KEY not set. Get one at https://aistudio.google.com/apikey")]
    ApiKeyNotSet,

    #[error("model rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("model quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("model API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("no response content from model")]
    EmptyResponse,

    #[error("could not parse model output: {0}")]
    Parse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl Retryable for LlmError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::RateLimited)
    }
}

/// Single contract for every text-generation collaborator: one prompt in,
/// one UTF-8 blob out. Implemented by `GeminiClient` for production; mock
/// implementations used in tests.
pub trait GenerateClient {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, LlmError>;
}
