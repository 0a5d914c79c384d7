//! HTTP providers for the hosted model APIs.

use super::provider::{GenerativeProvider, ProviderKind};
use crate::config::LlmSettings;
use crate::errors::{ConfigError, ExternalServiceError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Builds the provider selected by the settings.
///
/// # Errors
///
/// Returns an error if the API key is missing or the HTTP client cannot be
/// constructed.
pub fn build_provider(settings: &LlmSettings) -> Result<Arc<dyn GenerativeProvider>, ConfigError> {
    let kind = settings.provider;
    let api_key = settings
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ConfigError::new(kind.api_key_env(), "is not set"))?;

    let client = reqwest::Client::builder()
        .timeout(settings.timeout())
        .build()
        .map_err(|e| ConfigError::new("http client", e.to_string()))?;

    let endpoint = HttpEndpoint {
        client,
        api_key,
        model: settings.model_name().to_string(),
        base_url: settings.base_url.clone(),
        max_tokens: settings.max_tokens,
    };

    debug!(provider = %kind, model = %endpoint.model, "Selected generative provider");

    Ok(match kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider(endpoint)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider(endpoint)),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider(endpoint)),
    })
}

#[derive(Clone)]
struct HttpEndpoint {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: Option<String>,
    max_tokens: u32,
}

impl std::fmt::Debug for HttpEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEndpoint")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, ExternalServiceError> {
    let response = request
        .send()
        .await
        .map_err(|e| ExternalServiceError::new(provider, format!("request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ExternalServiceError::new(provider, format!("HTTP {status}: {body}"))
            .with_status(status.as_u16()));
    }

    response
        .json()
        .await
        .map_err(|e| ExternalServiceError::new(provider, format!("unreadable response body: {e}")))
}

fn non_empty(provider: &str, text: String) -> Result<String, ExternalServiceError> {
    if text.is_empty() {
        Err(ExternalServiceError::new(provider, "response contained no text"))
    } else {
        Ok(text)
    }
}

/// Google Gemini `generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiProvider(HttpEndpoint);

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ExternalServiceError> {
        let endpoint = &self.0;
        let base = endpoint.base_url.as_deref().unwrap_or(GEMINI_BASE_URL);
        let url = format!("{base}/{}:generateContent", endpoint.model);
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let request = endpoint
            .client
            .post(url)
            .header("x-goog-api-key", &endpoint.api_key)
            .json(&body);
        let response: GeminiResponse = send_json(self.name(), request).await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        non_empty(self.name(), text)
    }
}

/// Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicProvider(HttpEndpoint);

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[async_trait]
impl GenerativeProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ExternalServiceError> {
        let endpoint = &self.0;
        let body = AnthropicRequest {
            model: &endpoint.model,
            max_tokens: endpoint.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let request = endpoint
            .client
            .post(endpoint.base_url.as_deref().unwrap_or(ANTHROPIC_BASE_URL))
            .header("x-api-key", &endpoint.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response: AnthropicResponse = send_json(self.name(), request).await?;

        // Thinking blocks carry no text; only "text" blocks form the answer.
        let text: String = response
            .content
            .into_iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text)
            .collect();
        non_empty(self.name(), text)
    }
}

/// OpenAI Chat Completions API.
#[derive(Debug, Clone)]
pub struct OpenAiProvider(HttpEndpoint);

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[async_trait]
impl GenerativeProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ExternalServiceError> {
        let endpoint = &self.0;
        let body = OpenAiRequest {
            model: &endpoint.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let request = endpoint
            .client
            .post(endpoint.base_url.as_deref().unwrap_or(OPENAI_BASE_URL))
            .bearer_auth(&endpoint.api_key)
            .json(&body);
        let response: OpenAiResponse = send_json(self.name(), request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        non_empty(self.name(), text)
    }
}
