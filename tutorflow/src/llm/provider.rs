//! Generative provider abstraction.

use crate::errors::{ConfigError, ExternalServiceError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A text-in, text-out generative model.
///
/// Exactly one provider is active per process. Implementations do not retry
/// and do not cache; both are handled above them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Sends one prompt and returns the generated text.
    async fn generate(&self, prompt: &str) -> Result<String, ExternalServiceError>;
}

/// The supported provider vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Google Gemini.
    #[default]
    Gemini,
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Chat Completions API.
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    /// Model used when none is configured.
    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-pro",
            Self::Anthropic => "claude-3-7-sonnet-20250219",
            Self::OpenAi => "gpt-4o-mini",
        }
    }

    /// Environment variable holding the API key.
    #[must_use]
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Returns the lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(ConfigError::new(
                "LLM_PROVIDER",
                format!("unknown provider '{other}', expected gemini, anthropic or openai"),
            )),
        }
    }
}
