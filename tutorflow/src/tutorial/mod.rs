//! The codebase tutorial generator.
//!
//! Six stages run in a fixed chain over a [`TutorialState`]:
//!
//! ```text
//! fetch_repo -> identify_abstractions -> analyze_relationships
//!            -> order_chapters -> write_chapters -> combine_tutorial
//! ```
//!
//! Fetch and combine touch the outside world once and are not retried
//! unless configured; the four generative stages use the default policy.

pub mod parse;
pub mod prompts;
pub mod render;
pub mod stages;
mod state;

pub use stages::{
    AnalyzeRelationships, CombineTutorial, FetchRepo, IdentifyAbstractions, OrderChapters, WriteChapters,
    ANALYZE_RELATIONSHIPS, COMBINE_TUTORIAL, FETCH_REPO, IDENTIFY_ABSTRACTIONS, ORDER_CHAPTERS, WRITE_CHAPTERS,
};
pub use state::{
    Abstraction, Chapter, Relationship, RelationshipGraph, TutorialRequest, TutorialState, DEFAULT_LANGUAGE,
    DEFAULT_MAX_ABSTRACTIONS,
};

use crate::config::{RetrySettings, TutorflowConfig};
use crate::core::RunReport;
use crate::emit::TutorialEmitter;
use crate::errors::{PipelineValidationError, Result};
use crate::events::EventSink;
use crate::llm::LlmGateway;
use crate::pipeline::{Flow, FlowBuilder, RetryPolicy};
use crate::source::{SourceAcquirer, SourceFilters};
use std::sync::Arc;

/// Name of the tutorial flow.
pub const TUTORIAL_FLOW: &str = "tutorial";

/// The external collaborators a tutorial run needs.
#[derive(Debug, Clone)]
pub struct TutorialComponents {
    /// Where source files come from.
    pub source: Arc<dyn SourceAcquirer>,
    /// Which files are selected.
    pub filters: SourceFilters,
    /// Generative calls, with cache and call log attached.
    pub gateway: LlmGateway,
    /// Where the finished tutorial goes.
    pub emitter: Arc<dyn TutorialEmitter>,
}

fn boundary_policy(config: &TutorflowConfig, stage: &str) -> RetryPolicy {
    config
        .stage_retry
        .get(stage)
        .map_or_else(RetryPolicy::no_retry, RetrySettings::to_policy)
}

/// Wires the six stages into a flow.
///
/// # Errors
///
/// Returns an error if the flow fails validation.
pub fn build_tutorial_flow(
    components: TutorialComponents,
    config: &TutorflowConfig,
    sink: Arc<dyn EventSink>,
) -> Result<Flow<TutorialState>, PipelineValidationError> {
    let TutorialComponents {
        source,
        filters,
        gateway,
        emitter,
    } = components;

    let mut builder = FlowBuilder::new(TUTORIAL_FLOW)
        .stage(FetchRepo::new(source, filters))?
        .stage(IdentifyAbstractions::new(gateway.clone()))?
        .stage(AnalyzeRelationships::new(gateway.clone()))?
        .stage(OrderChapters::new(gateway.clone()))?
        .batch_stage(WriteChapters::new(gateway))?
        .stage(CombineTutorial::new(emitter))?
        .chain()?
        .default_retry(config.default_policy())
        .batch_concurrency(config.batch_concurrency)
        .event_sink(sink)
        .with_retry(FETCH_REPO, boundary_policy(config, FETCH_REPO))?
        .with_retry(COMBINE_TUTORIAL, boundary_policy(config, COMBINE_TUTORIAL))?;

    for stage in [IDENTIFY_ABSTRACTIONS, ANALYZE_RELATIONSHIPS, ORDER_CHAPTERS, WRITE_CHAPTERS] {
        if let Some(settings) = config.stage_retry.get(stage) {
            builder = builder.with_retry(stage, settings.to_policy())?;
        }
    }

    builder.build()
}

/// Runs a tutorial flow for one request and returns the final state.
///
/// # Errors
///
/// Returns the error of the first failing stage.
pub async fn generate_tutorial(
    flow: &Flow<TutorialState>,
    request: TutorialRequest,
) -> Result<(TutorialState, RunReport)> {
    let mut state = TutorialState::new(request);
    let report = flow.run(&mut state).await?;
    Ok((state, report))
}
