//! Process configuration.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional JSON file, and environment variables. The CLI applies its own
//! flags on top through the builder methods.

use crate::cache::DEFAULT_CACHE_FILE;
use crate::errors::ConfigError;
use crate::llm::ProviderKind;
use crate::pipeline::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default call log directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Which vendor to call.
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model name. Falls back to the provider's default.
    #[serde(default)]
    pub model: Option<String>,
    /// API key. Never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Override for the provider endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: f64,
    /// Response token limit, for vendors that require one.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_request_timeout() -> f64 {
    300.0
}

fn default_max_tokens() -> u32 {
    16_384
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            api_key: None,
            base_url: None,
            request_timeout_seconds: default_request_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmSettings {
    /// The configured model, or the provider default.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or_else(|| self.provider.default_model())
    }

    /// Gets the request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_seconds.max(0.0))
    }
}

/// Retry settings as they appear in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Wait between attempts in seconds.
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: u64,
    /// Retry malformed responses too.
    #[serde(default)]
    pub retry_format_errors: bool,
}

fn default_max_attempts() -> usize {
    crate::pipeline::DEFAULT_MAX_ATTEMPTS
}

fn default_wait_seconds() -> u64 {
    crate::pipeline::DEFAULT_WAIT_MS / 1000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            wait_seconds: default_wait_seconds(),
            retry_format_errors: false,
        }
    }
}

impl RetrySettings {
    /// Converts to the engine's policy type.
    #[must_use]
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_wait_secs(self.wait_seconds)
            .with_retry_format_errors(self.retry_format_errors)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorflowConfig {
    /// Cache file location.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Whether generative calls are memoized.
    #[serde(default = "default_true")]
    pub use_cache: bool,
    /// Directory for the daily call log.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Provider settings.
    #[serde(default)]
    pub llm: LlmSettings,
    /// Retry policy for stages without an override.
    #[serde(default)]
    pub retry: RetrySettings,
    /// Per-stage retry overrides, keyed by stage name.
    #[serde(default)]
    pub stage_retry: HashMap<String, RetrySettings>,
    /// Batch items in flight at once. 1 runs them sequentially.
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_FILE)
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_DIR)
}

fn default_true() -> bool {
    true
}

fn default_batch_concurrency() -> usize {
    1
}

impl Default for TutorflowConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            use_cache: true,
            log_dir: default_log_dir(),
            llm: LlmSettings::default(),
            retry: RetrySettings::default(),
            stage_retry: HashMap::new(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

impl TutorflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let origin = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::new(&origin, e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::new(origin, e.to_string()))
    }

    /// Defaults overlaid with the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `LLM_PROVIDER` names an unknown provider.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_from(|key| std::env::var(key).ok())
    }

    /// Overlays environment values obtained through `lookup`.
    ///
    /// Recognized: `LLM_CACHE_FILE`, `LOG_DIR`, `LLM_PROVIDER`, `LLM_MODEL`,
    /// and the API key variable of the selected provider.
    ///
    /// # Errors
    ///
    /// Returns an error if `LLM_PROVIDER` names an unknown provider.
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = present("LLM_CACHE_FILE") {
            self.cache_path = PathBuf::from(path);
        }
        if let Some(dir) = present("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(provider) = present("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(model) = present("LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = present(self.llm.provider.api_key_env());
        }
        Ok(self)
    }

    /// Sets the cache file.
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// Enables or disables the cache.
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Sets the call log directory.
    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Sets the provider.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.llm.provider = provider;
        self
    }

    /// Sets the default attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.retry.max_attempts = attempts;
        self
    }

    /// Sets the default wait between attempts.
    #[must_use]
    pub fn with_wait_seconds(mut self, seconds: u64) -> Self {
        self.retry.wait_seconds = seconds;
        self
    }

    /// Overrides retry settings for one stage.
    #[must_use]
    pub fn with_stage_retry(mut self, stage: impl Into<String>, settings: RetrySettings) -> Self {
        self.stage_retry.insert(stage.into(), settings);
        self
    }

    /// Sets the batch concurrency limit.
    #[must_use]
    pub fn with_batch_concurrency(mut self, limit: usize) -> Self {
        self.batch_concurrency = limit.max(1);
        self
    }

    /// Retry policy for stages without an override.
    #[must_use]
    pub fn default_policy(&self) -> RetryPolicy {
        self.retry.to_policy()
    }

    /// Retry policy for a named stage.
    #[must_use]
    pub fn policy_for(&self, stage: &str) -> RetryPolicy {
        self.stage_retry
            .get(stage)
            .map_or_else(|| self.default_policy(), RetrySettings::to_policy)
    }
}
