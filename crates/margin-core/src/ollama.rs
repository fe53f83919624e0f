//! Ollama client for embeddings and completion. Wraps ollama-rs behind [`EmbeddingProvider`].

use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use ollama_rs::models::ModelOptions;
use ollama_rs::Ollama;

use crate::config::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE};

use crate::provider::{EmbeddingProvider, ProviderError};

pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_CHAT_MODEL: &str = "llama3.2";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const SYSTEM_INSTRUCTIONS: &str = "You answer questions about the user's markdown notes.
Use only the numbered snippets in the prompt as evidence and say when they are insufficient.
Cite snippets by their number. Prefer short, factual answers.";

/// Thin wrapper around Ollama for embedding and completion.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    inner: Ollama,
    embed_model: String,
    chat_model: String,
    temperature: f32,
    max_output_tokens: i32,
}

impl OllamaClient {
    /// Create from URL string, e.g. `http://localhost:11434`.
    pub fn from_url(url: &str) -> Result<Self, ProviderError> {
        let inner = Ollama::try_new(url)?;
        Ok(Self {
            inner,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        })
    }

    /// Set the embedding model (e.g. `nomic-embed-text`, `all-minilm`).
    pub fn with_embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = model.into();
        self
    }

    /// Set the model used by [`EmbeddingProvider::respond`].
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Sampling temperature and token cap sent with every answer request.
    pub fn with_generation_options(mut self, temperature: f32, max_output_tokens: i32) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    fn generation_request(&self, prompt: &str) -> GenerationRequest<'static> {
        let options = ModelOptions::default()
            .temperature(self.temperature)
            .num_predict(self.max_output_tokens);
        GenerationRequest::new(self.chat_model.clone(), prompt.to_string())
            .system(SYSTEM_INSTRUCTIONS.to_string())
            .options(options)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    /// Embed multiple strings in one call. Returns one embedding per input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let req = GenerateEmbeddingsRequest::new(
            self.embed_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let res = self
            .inner
            .generate_embeddings(req)
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok(res.embeddings)
    }

    async fn respond(&self, prompt: &str) -> Result<String, ProviderError> {
        let res = self
            .inner
            .generate(self.generation_request(prompt))
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let answer = res.response.trim();
        if answer.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(answer.to_string())
    }
}
