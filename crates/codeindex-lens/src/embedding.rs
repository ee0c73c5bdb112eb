//! Embedding gateway trait and HTTP clients.
//!
//! The indexer only needs `embed(text) -> vector`. Two clients are provided:
//! a local Ollama client (the default) and an OpenAI-compatible
//! `/embeddings` client used for Voyage and OpenAI.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codeindex_core::{CodeIndexError, EmbeddingConfig, Result, DEFAULT_OLLAMA_URL};
use serde::{Deserialize, Serialize};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const VOYAGE_BASE_URL: &str = "https://api.voyageai.com/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Anything that can turn text into a vector.
///
/// Implementations must be deterministic enough that identical text yields
/// comparable vectors, and must use one dimensionality for a given model.
/// Dropping the returned future abandons the request.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier recorded in the index.
    fn model_name(&self) -> &str;
}

/// Build the gateway selected by `config.provider`.
///
/// # Errors
///
/// Returns [`CodeIndexError::Config`] for an unknown provider or a hosted
/// provider without an API key.
///
/// # Examples
///
/// ```
/// use codeindex_core::EmbeddingConfig;
/// use codeindex_lens::embedding::build_embedder;
///
/// let embedder = build_embedder(&EmbeddingConfig::default()).unwrap();
/// assert_eq!(embedder.model_name(), "nomic-embed-text");
/// ```
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingGateway>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbeddings::from_config(config)?)),
        "voyage" | "openai" => Ok(Arc::new(EmbeddingClient::with_config(config)?)),
        other => Err(CodeIndexError::Config(format!(
            "unknown embedding provider '{other}' (expected ollama, voyage or openai)"
        ))),
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| CodeIndexError::Gateway(format!("failed to create HTTP client: {e}")))
}

async fn error_for_status(response: reqwest::Response, backend: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read response body".into());
    Err(CodeIndexError::Gateway(format!(
        "{backend} returned {status}: {body}"
    )))
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Client for Ollama's `/api/embeddings` endpoint.
///
/// # Examples
///
/// ```
/// use codeindex_lens::embedding::{EmbeddingGateway, OllamaEmbeddings};
///
/// let client = OllamaEmbeddings::new("http://localhost:11434/", "nomic-embed-text").unwrap();
/// assert_eq!(client.base_url(), "http://localhost:11434");
/// assert_eq!(client.model_name(), "nomic-embed-text");
/// ```
pub struct OllamaEmbeddings {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OllamaEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaEmbeddings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OllamaEmbeddings {
    /// Create a client for `model` served at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::Gateway`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Create a client from an [`EmbeddingConfig`], defaulting to
    /// `http://localhost:11434`.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::Gateway`] if the HTTP client cannot be built.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        Self::new(base_url, &config.model)
    }

    /// Endpoint base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl EmbeddingGateway for OllamaEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| CodeIndexError::Gateway(format!("ollama request failed: {e}")))?;
        let response = error_for_status(response, "ollama").await?;

        let body: OllamaEmbedResponse = response
            .json()
            .await
            .map_err(|e| CodeIndexError::Gateway(format!("failed to parse ollama response: {e}")))?;

        if body.embedding.is_empty() {
            return Err(CodeIndexError::Gateway(format!(
                "ollama returned an empty embedding for model '{}'",
                self.model
            )));
        }
        Ok(body.embedding)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_type: Option<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

/// Client for OpenAI-compatible `/embeddings` APIs (Voyage, OpenAI).
///
/// # Examples
///
/// ```
/// use codeindex_core::EmbeddingConfig;
/// use codeindex_lens::embedding::{EmbeddingClient, EmbeddingGateway};
///
/// let config = EmbeddingConfig {
///     provider: "voyage".into(),
///     model: "voyage-code-3".into(),
///     api_key: Some("test-key".into()),
///     base_url: None,
/// };
/// let client = EmbeddingClient::with_config(&config).unwrap();
/// assert_eq!(client.model_name(), "voyage-code-3");
/// ```
pub struct EmbeddingClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    input_type: Option<&'static str>,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl EmbeddingClient {
    /// Create a client from an [`EmbeddingConfig`] whose provider is
    /// `voyage` or `openai`.
    ///
    /// Falls back to `VOYAGE_API_KEY` or `OPENAI_API_KEY` when the config
    /// carries no key.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::Config`] if no API key is available.
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self> {
        let (env_var, default_base, input_type) = match config.provider.as_str() {
            "openai" => ("OPENAI_API_KEY", OPENAI_BASE_URL, None),
            _ => ("VOYAGE_API_KEY", VOYAGE_BASE_URL, Some("document")),
        };

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(env_var).ok())
            .ok_or_else(|| {
                CodeIndexError::Config(format!(
                    "embedding API key not found: set embedding.api_key in .codeindex.toml or {env_var} env var"
                ))
            })?;

        Ok(Self {
            client: http_client()?,
            api_key,
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(default_base)
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            input_type,
        })
    }

    fn build_request<'a>(&'a self, text: &'a str) -> EmbedRequest<'a> {
        EmbedRequest {
            model: &self.model,
            input: vec![text],
            input_type: self.input_type,
        }
    }
}

#[async_trait]
impl EmbeddingGateway for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.build_request(text))
            .send()
            .await
            .map_err(|e| CodeIndexError::Gateway(format!("HTTP request failed: {e}")))?;
        let response = error_for_status(response, "embedding API").await?;

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| CodeIndexError::Gateway(format!("failed to parse response: {e}")))?;

        body.data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| CodeIndexError::Gateway("empty response from embedding API".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
