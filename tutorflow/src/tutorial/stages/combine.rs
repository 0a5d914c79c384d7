use super::COMBINE_TUTORIAL;
use crate::emit::{TutorialDocument, TutorialEmitter};
use crate::errors::{PreconditionError, Result};
use crate::stages::{ExecContext, Stage};
use crate::tutorial::render::{render_document, IndexView};
use crate::tutorial::state::TutorialState;
use async_trait::async_trait;
use std::sync::Arc;

/// Renders the index and chapter files and hands them to the emitter.
#[derive(Debug, Clone)]
pub struct CombineTutorial {
    emitter: Arc<dyn TutorialEmitter>,
}

impl CombineTutorial {
    /// Creates the stage.
    #[must_use]
    pub fn new(emitter: Arc<dyn TutorialEmitter>) -> Self {
        Self { emitter }
    }
}

#[async_trait]
impl Stage<TutorialState> for CombineTutorial {
    type Prep = TutorialDocument;
    type Output = String;

    fn name(&self) -> &str {
        COMBINE_TUTORIAL
    }

    fn prep(&self, state: &TutorialState) -> Result<TutorialDocument> {
        let project = state
            .project_name
            .as_deref()
            .ok_or_else(|| PreconditionError::missing(COMBINE_TUTORIAL, "project_name"))?;
        let graph = state
            .relationships
            .as_ref()
            .ok_or_else(|| PreconditionError::missing(COMBINE_TUTORIAL, "relationships"))?;
        if state.chapters.is_empty() {
            return Err(PreconditionError::new(COMBINE_TUTORIAL, "chapters", "is empty").into());
        }

        Ok(render_document(&IndexView {
            project,
            summary: &graph.summary,
            source: state.source_locator.as_deref(),
            abstractions: &state.abstractions,
            relationships: &graph.relationships,
            chapters: &state.chapters,
        }))
    }

    async fn exec(&self, prep: &TutorialDocument, _ctx: ExecContext) -> Result<String> {
        Ok(self.emitter.emit(prep).await?)
    }

    fn post(&self, state: &mut TutorialState, _prep: TutorialDocument, output: String) {
        tracing::info!(stage = COMBINE_TUTORIAL, destination = %output, chapters = state.chapters.len(), "Tutorial written");
        state.output_location = Some(output);
    }
}
