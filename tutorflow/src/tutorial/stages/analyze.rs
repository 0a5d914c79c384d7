use super::{ask, ANALYZE_RELATIONSHIPS};
use crate::errors::{PreconditionError, Result};
use crate::llm::LlmGateway;
use crate::source::SourceFile;
use crate::stages::{ExecContext, Stage};
use crate::tutorial::parse::parse_relationships;
use crate::tutorial::prompts;
use crate::tutorial::state::{Abstraction, RelationshipGraph, TutorialRequest, TutorialState};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Inputs of [`AnalyzeRelationships`].
#[derive(Debug, Clone)]
pub struct RelationshipInput {
    /// Project name.
    pub project: String,
    /// Caller options.
    pub request: TutorialRequest,
    /// Identified abstractions.
    pub abstractions: Vec<Abstraction>,
    /// Files referenced by any abstraction, with their original indices.
    pub files: Vec<(usize, SourceFile)>,
}

/// Asks for a project summary and how the abstractions interact.
#[derive(Debug, Clone)]
pub struct AnalyzeRelationships {
    gateway: LlmGateway,
}

impl AnalyzeRelationships {
    /// Creates the stage.
    #[must_use]
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Stage<TutorialState> for AnalyzeRelationships {
    type Prep = RelationshipInput;
    type Output = RelationshipGraph;

    fn name(&self) -> &str {
        ANALYZE_RELATIONSHIPS
    }

    fn prep(&self, state: &TutorialState) -> Result<RelationshipInput> {
        if state.abstractions.is_empty() {
            return Err(PreconditionError::new(ANALYZE_RELATIONSHIPS, "abstractions", "is empty").into());
        }
        let project = state
            .project_name
            .clone()
            .ok_or_else(|| PreconditionError::missing(ANALYZE_RELATIONSHIPS, "project_name"))?;

        let referenced: Vec<usize> = state
            .abstractions
            .iter()
            .flat_map(|a| a.files.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let files = state
            .files_at(&referenced)
            .into_iter()
            .map(|(i, f)| (i, f.clone()))
            .collect();

        Ok(RelationshipInput {
            project,
            request: state.request.clone(),
            abstractions: state.abstractions.clone(),
            files,
        })
    }

    async fn exec(&self, prep: &RelationshipInput, ctx: ExecContext) -> Result<RelationshipGraph> {
        let files: Vec<(usize, &SourceFile)> = prep.files.iter().map(|(i, f)| (*i, f)).collect();
        let prompt = prompts::analyze_relationships(&prep.project, &prep.request, &prep.abstractions, &files);
        let response = ask(&self.gateway, &prep.request, &prompt, ctx).await?;
        let graph = parse_relationships(ANALYZE_RELATIONSHIPS, &response, prep.abstractions.len())?;
        tracing::info!(
            stage = ANALYZE_RELATIONSHIPS,
            relationships = graph.relationships.len(),
            "Analyzed relationships"
        );
        Ok(graph)
    }

    fn post(&self, state: &mut TutorialState, _prep: RelationshipInput, output: RelationshipGraph) {
        state.relationships = Some(output);
    }
}
