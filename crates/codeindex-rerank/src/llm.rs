use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codeindex_core::{CodeIndexError, GenerationConfig, Result, DEFAULT_OLLAMA_URL};
use serde::{Deserialize, Serialize};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Anything that can complete a prompt with text.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Complete `prompt` and return the raw model output.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier, for logs and health messages.
    fn model_name(&self) -> &str;
}

/// Build the generator selected by `config.provider`.
///
/// # Errors
///
/// Returns [`CodeIndexError::Config`] for an unknown provider.
///
/// # Examples
///
/// ```
/// use codeindex_core::GenerationConfig;
/// use codeindex_rerank::llm::build_generator;
///
/// let generator = build_generator(&GenerationConfig::default()).unwrap();
/// assert_eq!(generator.model_name(), "qwen2.5:1.5b");
/// ```
pub fn build_generator(config: &GenerationConfig) -> Result<Arc<dyn GenerationGateway>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::from_config(config)?)),
        "openai" => Ok(Arc::new(ChatCompletionsGenerator::new(config)?)),
        other => Err(CodeIndexError::Config(format!(
            "unknown generation provider '{other}' (expected ollama or openai)"
        ))),
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| CodeIndexError::Gateway(format!("failed to create HTTP client: {e}")))
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for Ollama's `/api/generate` endpoint, non-streaming.
///
/// # Examples
///
/// ```
/// use codeindex_rerank::llm::{GenerationGateway, OllamaGenerator};
///
/// let generator = OllamaGenerator::new("http://localhost:11434", "qwen2.5:1.5b").unwrap();
/// assert_eq!(generator.model_name(), "qwen2.5:1.5b");
/// ```
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OllamaGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaGenerator")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OllamaGenerator {
    /// Create a generator for `model` served at `base_url`.
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

    /// Create a generator from a [`GenerationConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::Gateway`] if the HTTP client cannot be built.
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        Self::new(
            config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL),
            &config.model,
        )
    }
}

#[async_trait]
impl GenerationGateway for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| CodeIndexError::Gateway(format!("ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CodeIndexError::Gateway(format!(
                "ollama returned {status}: {body}"
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CodeIndexError::Gateway(format!("failed to parse ollama response: {e}")))?;
        Ok(body.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    User,
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider exposing `/v1/chat/completions`: OpenAI, vLLM,
/// LiteLLM and so on. The prompt is sent as a single user message.
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    config: GenerationConfig,
}

impl std::fmt::Debug for ChatCompletionsGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsGenerator")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsGenerator {
    /// Create a client from configuration. Uses `OPENAI_API_KEY` when the
    /// config carries no key.
    ///
    /// # Errors
    ///
    /// Returns [`CodeIndexError::Gateway`] if the HTTP client cannot be built.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let mut config = config.clone();
        if config.api_key.is_none() {
            config.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        Ok(Self {
            client: http_client()?,
            config,
        })
    }

    /// Send `prompt` as a single user message and return the reply text.
    async fn chat(&self, prompt: &str) -> Result<String> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(OPENAI_BASE_URL)
            .trim_end_matches('/');
        let url = format!("{base_url}/v1/chat/completions");

        let messages = [ChatMessage {
            role: Role::User,
            content: prompt,
        }];
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": 0.1,
        });

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| CodeIndexError::Gateway(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CodeIndexError::Gateway(format!(
                "chat API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CodeIndexError::Gateway(format!("failed to parse response: {e}")))?;

        extract_content(&response_body)
    }
}

fn extract_content(response_body: &serde_json::Value) -> Result<String> {
    response_body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            CodeIndexError::Gateway(format!("unexpected response structure: {response_body}"))
        })
}

#[async_trait]
impl GenerationGateway for ChatCompletionsGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(prompt).await
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_disables_streaming() {
        let request = GenerateRequest {
            model: "qwen2.5:1.5b",
            prompt: "JSON array:",
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "qwen2.5:1.5b");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn generate_response_parses() {
        let body: GenerateResponse =
            serde_json::from_str(r#"{"model":"m","response":"[0.9, 0.1]","done":true}"#).unwrap();
        assert_eq!(body.response, "[0.9, 0.1]");
    }

    #[test]
    fn chat_message_serializes() {
        let msg = ChatMessage {
            role: Role::User,
            content: "hello",
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn chat_content_is_extracted() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "[0.5]"}}]
        });
        assert_eq!(extract_content(&body).unwrap(), "[0.5]");
        assert!(extract_content(&serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = GenerationConfig {
            provider: "anthropic".into(),
            ..GenerationConfig::default()
        };
        assert!(matches!(
            build_generator(&config),
            Err(CodeIndexError::Config(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_gateway_error() {
        let generator = OllamaGenerator::new("http://127.0.0.1:9", "qwen2.5:1.5b").unwrap();
        let err = generator.generate("hi").await.unwrap_err();
        assert!(matches!(err, CodeIndexError::Gateway(_)));
    }
}
