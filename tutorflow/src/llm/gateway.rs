//! The single entry point for generative calls.

use super::call_log::CallLog;
use super::provider::GenerativeProvider;
use crate::cache::CacheStore;
use crate::errors::ExternalServiceError;
use std::sync::Arc;

/// How a single call uses the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Answer from the cache when possible and record fresh responses.
    ReadWrite,
    /// Always call the provider but record the response.
    WriteOnly,
    /// Leave the cache untouched.
    Off,
}

impl CacheMode {
    fn reads(self) -> bool {
        self == Self::ReadWrite
    }

    fn writes(self) -> bool {
        self != Self::Off
    }
}

/// Wraps the active provider with memoization and call logging.
///
/// The gateway never retries; stages do that under their retry policy.
#[derive(Clone)]
pub struct LlmGateway {
    provider: Arc<dyn GenerativeProvider>,
    cache: Option<Arc<dyn CacheStore>>,
    log: Arc<CallLog>,
}

impl std::fmt::Debug for LlmGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmGateway")
            .field("provider", &self.provider.name())
            .field("cache", &self.cache)
            .field("log", &self.log)
            .finish()
    }
}

impl LlmGateway {
    /// Creates a gateway without cache or call log.
    #[must_use]
    pub fn new(provider: Arc<dyn GenerativeProvider>) -> Self {
        Self {
            provider,
            cache: None,
            log: Arc::new(CallLog::disabled()),
        }
    }

    /// Attaches a cache store.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attaches a call log.
    #[must_use]
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = Arc::new(log);
        self
    }

    /// Name of the active provider.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Sends a prompt, consulting the cache first when `use_cache` is set.
    ///
    /// On a miss the provider's response is stored before it is returned.
    /// Provider errors are returned unchanged and nothing is cached for them.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when the prompt is not answered from
    /// the cache and the call fails.
    pub async fn invoke(&self, prompt: &str, use_cache: bool) -> Result<String, ExternalServiceError> {
        let mode = if use_cache { CacheMode::ReadWrite } else { CacheMode::Off };
        self.invoke_with(prompt, mode).await
    }

    /// Sends a prompt under an explicit [`CacheMode`].
    ///
    /// # Errors
    ///
    /// Returns the provider's error when the prompt is not answered from
    /// the cache and the call fails.
    pub async fn invoke_with(&self, prompt: &str, mode: CacheMode) -> Result<String, ExternalServiceError> {
        self.log.prompt(prompt);

        if mode.reads() {
            if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(prompt)) {
                tracing::debug!(provider = self.provider.name(), prompt_len = prompt.len(), "Cache hit");
                self.log.response(&hit);
                return Ok(hit);
            }
        }

        tracing::debug!(provider = self.provider.name(), prompt_len = prompt.len(), ?mode, "Calling provider");
        let response = match self.provider.generate(prompt).await {
            Ok(response) => response,
            Err(e) => {
                self.log.failure(&e.to_string());
                return Err(e);
            }
        };
        self.log.response(&response);

        if let Some(cache) = self.cache.as_ref().filter(|_| mode.writes()) {
            cache.put(prompt, &response);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryCache, JsonFileCache};
    use crate::llm::provider::MockGenerativeProvider;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn counting_mock(times: usize) -> MockGenerativeProvider {
        let mut mock = MockGenerativeProvider::new();
        mock.expect_name().return_const("mock".to_string());
        mock.expect_generate()
            .times(times)
            .returning(|prompt| Ok(format!("echo: {prompt}")));
        mock
    }

    #[tokio::test]
    async fn test_cached_prompt_calls_provider_once() {
        let cache = Arc::new(InMemoryCache::new());
        let gateway = LlmGateway::new(Arc::new(counting_mock(1))).with_cache(cache.clone());

        let first = gateway.invoke("hi", true).await.unwrap();
        let second = gateway.invoke("hi", true).await.unwrap();

        assert_eq!(first, "echo: hi");
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_use_cache_false_bypasses_cache() {
        let cache = Arc::new(InMemoryCache::new());
        cache.put("hi", "stale");
        let gateway = LlmGateway::new(Arc::new(counting_mock(2))).with_cache(cache.clone());

        assert_eq!(gateway.invoke("hi", false).await.unwrap(), "echo: hi");
        assert_eq!(gateway.invoke("hi", false).await.unwrap(), "echo: hi");
        assert_eq!(cache.get("hi"), Some("stale".to_string()));
    }

    #[tokio::test]
    async fn test_provider_error_is_not_cached() {
        let mut mock = MockGenerativeProvider::new();
        mock.expect_name().return_const("mock".to_string());
        mock.expect_generate()
            .times(1)
            .returning(|_| Err(ExternalServiceError::new("mock", "rate limited").with_status(429)));
        let cache = Arc::new(InMemoryCache::new());
        let gateway = LlmGateway::new(Arc::new(mock)).with_cache(cache.clone());

        let err = gateway.invoke("hi", true).await.unwrap_err();

        assert_eq!(err.status, Some(429));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invoke_writes_file_cache_and_call_log() {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(JsonFileCache::new(dir.path().join("llm_cache.json")));
        let log = CallLog::new(dir.path().join("logs"));
        let log_file = log.current_file().unwrap();
        let gateway = LlmGateway::new(Arc::new(counting_mock(1)))
            .with_cache(cache.clone())
            .with_call_log(log);

        gateway.invoke("hi", true).await.unwrap();
        gateway.invoke("hi", true).await.unwrap();

        assert_eq!(cache.get("hi"), Some("echo: hi".to_string()));
        let logged = std::fs::read_to_string(log_file).unwrap();
        assert_eq!(logged.matches("PROMPT: hi").count(), 2);
        assert_eq!(logged.matches("RESPONSE: echo: hi").count(), 2);
    }

    #[tokio::test]
    async fn test_write_only_skips_lookup_but_records() {
        let cache = Arc::new(InMemoryCache::new());
        let gateway = LlmGateway::new(Arc::new(counting_mock(2))).with_cache(cache.clone());

        gateway.invoke_with("hi", CacheMode::WriteOnly).await.unwrap();
        assert_eq!(cache.get("hi"), Some("echo: hi".to_string()));

        // A recorded entry does not short-circuit a write-only call.
        gateway.invoke_with("hi", CacheMode::WriteOnly).await.unwrap();
        assert_eq!(cache.len(), 1);
    }
}
