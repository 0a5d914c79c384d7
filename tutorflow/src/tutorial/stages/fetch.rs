use super::FETCH_REPO;
use crate::errors::Result;
use crate::source::{SourceAcquirer, SourceFile, SourceFilters};
use crate::stages::{ExecContext, Stage};
use crate::tutorial::state::TutorialState;
use async_trait::async_trait;
use std::sync::Arc;

/// Files plus the identity of the source they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSource {
    /// Selected files, ordered by path.
    pub files: Vec<SourceFile>,
    /// Path or URL of the source.
    pub locator: String,
    /// Name derived from the source.
    pub derived_name: String,
}

/// Reads the selected files from the configured source.
#[derive(Debug, Clone)]
pub struct FetchRepo {
    source: Arc<dyn SourceAcquirer>,
    filters: SourceFilters,
}

impl FetchRepo {
    /// Creates the stage.
    #[must_use]
    pub fn new(source: Arc<dyn SourceAcquirer>, filters: SourceFilters) -> Self {
        Self { source, filters }
    }
}

#[async_trait]
impl Stage<TutorialState> for FetchRepo {
    type Prep = ();
    type Output = FetchedSource;

    fn name(&self) -> &str {
        FETCH_REPO
    }

    fn prep(&self, _state: &TutorialState) -> Result<()> {
        Ok(())
    }

    async fn exec(&self, _prep: &(), _ctx: ExecContext) -> Result<FetchedSource> {
        let files = self.source.acquire(&self.filters).await?;
        tracing::info!(stage = FETCH_REPO, files = files.len(), source = %self.source.locator(), "Fetched source files");
        Ok(FetchedSource {
            files,
            locator: self.source.locator(),
            derived_name: self.source.project_name(),
        })
    }

    fn post(&self, state: &mut TutorialState, _prep: (), output: FetchedSource) {
        let name = state
            .request
            .project_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(output.derived_name);
        state.project_name = Some(name);
        state.source_locator = Some(output.locator);
        state.files = output.files;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_files, InMemorySource};
    use crate::tutorial::state::TutorialRequest;
    use pretty_assertions::assert_eq;

    async fn run(stage: &FetchRepo, state: &mut TutorialState) -> Result<()> {
        stage.prep(state)?;
        let output = stage.exec(&(), ExecContext::first(1)).await?;
        stage.post(state, (), output);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_derives_project_name() {
        let source = Arc::new(InMemorySource::new("https://github.com/acme/widget", sample_files()));
        let stage = FetchRepo::new(source, SourceFilters::default());
        let mut state = TutorialState::default();

        run(&stage, &mut state).await.unwrap();

        assert_eq!(state.project_name.as_deref(), Some("widget"));
        assert_eq!(state.source_locator.as_deref(), Some("https://github.com/acme/widget"));
        assert_eq!(state.files.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_keeps_explicit_name() {
        let source = Arc::new(InMemorySource::new("/tmp/widget", sample_files()));
        let stage = FetchRepo::new(source, SourceFilters::default());
        let mut state = TutorialState::new(TutorialRequest::new().with_project_name("Gadget"));

        run(&stage, &mut state).await.unwrap();
        assert_eq!(state.project_name.as_deref(), Some("Gadget"));
    }

    #[tokio::test]
    async fn test_fetch_propagates_empty_source() {
        let source = Arc::new(InMemorySource::new("/tmp/empty", Vec::new()));
        let stage = FetchRepo::new(source, SourceFilters::default());
        let mut state = TutorialState::default();

        let err = run(&stage, &mut state).await.unwrap_err();
        assert_eq!(err.kind(), "source_acquisition");
        assert!(state.files.is_empty());
    }
}
