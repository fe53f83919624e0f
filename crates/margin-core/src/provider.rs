//! The model backend the index talks to: text → vectors, and prompt → answer.
//!
//! [`crate::ollama::OllamaClient`] is the shipped implementation. Tests plug
//! in their own.

use async_trait::async_trait;

/// Embedding and completion backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. Must return one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Answer a free-text prompt.
    async fn respond(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid provider URL: {0}")]
    ParseUrl(#[from] url::ParseError),
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider returned an empty response")]
    EmptyResponse,
}
