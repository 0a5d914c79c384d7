use super::{ask, ORDER_CHAPTERS};
use crate::errors::{PreconditionError, Result};
use crate::llm::LlmGateway;
use crate::stages::{ExecContext, Stage};
use crate::tutorial::parse::parse_chapter_order;
use crate::tutorial::prompts;
use crate::tutorial::state::{Abstraction, RelationshipGraph, TutorialRequest, TutorialState};
use async_trait::async_trait;

/// Inputs of [`OrderChapters`].
#[derive(Debug, Clone)]
pub struct OrderInput {
    /// Project name.
    pub project: String,
    /// Caller options.
    pub request: TutorialRequest,
    /// Identified abstractions.
    pub abstractions: Vec<Abstraction>,
    /// Summary and relationships.
    pub graph: RelationshipGraph,
}

/// Asks for the order in which abstractions should be taught.
#[derive(Debug, Clone)]
pub struct OrderChapters {
    gateway: LlmGateway,
}

impl OrderChapters {
    /// Creates the stage.
    #[must_use]
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Stage<TutorialState> for OrderChapters {
    type Prep = OrderInput;
    type Output = Vec<usize>;

    fn name(&self) -> &str {
        ORDER_CHAPTERS
    }

    fn prep(&self, state: &TutorialState) -> Result<OrderInput> {
        if state.abstractions.is_empty() {
            return Err(PreconditionError::new(ORDER_CHAPTERS, "abstractions", "is empty").into());
        }
        let graph = state
            .relationships
            .clone()
            .ok_or_else(|| PreconditionError::missing(ORDER_CHAPTERS, "relationships"))?;
        let project = state
            .project_name
            .clone()
            .ok_or_else(|| PreconditionError::missing(ORDER_CHAPTERS, "project_name"))?;

        Ok(OrderInput {
            project,
            request: state.request.clone(),
            abstractions: state.abstractions.clone(),
            graph,
        })
    }

    async fn exec(&self, prep: &OrderInput, ctx: ExecContext) -> Result<Vec<usize>> {
        let prompt = prompts::order_chapters(&prep.project, &prep.request, &prep.abstractions, &prep.graph);
        let response = ask(&self.gateway, &prep.request, &prompt, ctx).await?;
        Ok(parse_chapter_order(ORDER_CHAPTERS, &response, prep.abstractions.len())?)
    }

    fn post(&self, state: &mut TutorialState, _prep: OrderInput, output: Vec<usize>) {
        tracing::info!(stage = ORDER_CHAPTERS, order = ?output, "Ordered chapters");
        state.chapter_order = output;
    }
}
