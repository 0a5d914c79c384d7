//! Test doubles for the external collaborators.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::emit::{TutorialDocument, TutorialEmitter};
use crate::errors::{EmissionError, ExternalServiceError, SourceAcquisitionError};
use crate::llm::GenerativeProvider;
use crate::source::{SourceAcquirer, SourceFile, SourceFilters};

type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A provider that answers from a script of `(prompt fragment, response)`
/// rules. The first rule whose fragment occurs in the prompt wins; a prompt
/// matching no rule fails.
#[derive(Default)]
pub struct ScriptedProvider {
    rules: Vec<(String, Responder)>,
    outages: AtomicUsize,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl std::fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("rules", &self.rules.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .field("calls", &self.calls())
            .finish()
    }
}

impl ScriptedProvider {
    /// Creates a provider with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers prompts containing `fragment` with a fixed response.
    #[must_use]
    pub fn on(self, fragment: impl Into<String>, response: impl Into<String>) -> Self {
        let response = response.into();
        self.on_fn(fragment, move |_| response.clone())
    }

    /// Answers prompts containing `fragment` with a response computed from
    /// the prompt.
    #[must_use]
    pub fn on_fn<F>(mut self, fragment: impl Into<String>, responder: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.rules.push((fragment.into(), Arc::new(responder)));
        self
    }

    /// Fails the next `count` calls with a 503 before answering again.
    #[must_use]
    pub fn failing_first(self, count: usize) -> Self {
        self.outages.store(count, Ordering::SeqCst);
        self
    }

    /// Number of `generate` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl GenerativeProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ExternalServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        let outage = self
            .outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if outage {
            return Err(ExternalServiceError::new("scripted", "temporarily unavailable").with_status(503));
        }
        self.rules
            .iter()
            .find(|(fragment, _)| prompt.contains(fragment.as_str()))
            .map(|(_, respond)| respond(prompt))
            .ok_or_else(|| ExternalServiceError::new("scripted", "no scripted response for prompt"))
    }
}

/// A provider that fails every call.
#[derive(Debug)]
pub struct FailingProvider {
    message: String,
    calls: AtomicUsize,
}

impl FailingProvider {
    /// Creates a provider failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `generate` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, ExternalServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ExternalServiceError::new("failing", self.message.clone()).with_status(503))
    }
}

/// An emitter that keeps documents in memory.
#[derive(Debug, Default)]
pub struct InMemoryEmitter {
    documents: Mutex<Vec<TutorialDocument>>,
    fail_with: Option<String>,
}

impl InMemoryEmitter {
    /// Creates an emitter that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an emitter that rejects every document.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    /// Documents emitted so far.
    #[must_use]
    pub fn documents(&self) -> Vec<TutorialDocument> {
        self.documents.lock().clone()
    }
}

#[async_trait]
impl TutorialEmitter for InMemoryEmitter {
    async fn emit(&self, document: &TutorialDocument) -> Result<String, EmissionError> {
        let destination = format!("memory://{}", document.project_name);
        if let Some(message) = &self.fail_with {
            return Err(EmissionError::new(destination, message.clone()));
        }
        self.documents.lock().push(document.clone());
        Ok(destination)
    }
}

/// A source serving a fixed file list through the usual filters.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    locator: String,
    files: Vec<SourceFile>,
}

impl InMemorySource {
    /// Creates a source named `locator` holding `files`.
    #[must_use]
    pub fn new(locator: impl Into<String>, files: Vec<SourceFile>) -> Self {
        Self {
            locator: locator.into(),
            files,
        }
    }
}

#[async_trait]
impl SourceAcquirer for InMemorySource {
    fn locator(&self) -> String {
        self.locator.clone()
    }

    async fn acquire(&self, filters: &SourceFilters) -> Result<Vec<SourceFile>, SourceAcquisitionError> {
        let mut files: Vec<SourceFile> = self
            .files
            .iter()
            .filter(|f| filters.matches(&f.path) && filters.within_size(f.content.len() as u64))
            .cloned()
            .collect();
        if files.is_empty() {
            return Err(SourceAcquisitionError::new(
                &self.locator,
                "no files matched the include/exclude patterns",
            ));
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_provider_first_match_wins() {
        let provider = ScriptedProvider::new()
            .on("alpha", "A")
            .on_fn("a", |prompt| prompt.to_uppercase());

        assert_eq!(provider.generate("alpha beta").await.unwrap(), "A");
        assert_eq!(provider.generate("gamma").await.unwrap(), "GAMMA");
        assert!(provider.generate("xyz").await.is_err());
        assert_eq!(provider.calls(), 3);
        assert_eq!(provider.prompts()[1], "gamma");
    }

    #[tokio::test]
    async fn test_scripted_provider_recovers_after_outage() {
        let provider = ScriptedProvider::new().on("", "ok").failing_first(2);

        assert_eq!(provider.generate("p").await.unwrap_err().status, Some(503));
        assert!(provider.generate("p").await.is_err());
        assert_eq!(provider.generate("p").await.unwrap(), "ok");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_failing_provider_counts() {
        let provider = FailingProvider::new("down");
        let err = provider.generate("p").await.unwrap_err();
        assert_eq!(err.status, Some(503));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_source_filters() {
        let source = InMemorySource::new(
            "mem",
            vec![SourceFile::new("b.py", "b"), SourceFile::new("a.py", "a"), SourceFile::new("x.bin", "x")],
        );
        let files = source.acquire(&SourceFilters::default()).await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "b.py"]);
    }
}
