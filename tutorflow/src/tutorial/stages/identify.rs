use super::{ask, IDENTIFY_ABSTRACTIONS};
use crate::errors::{PreconditionError, Result};
use crate::llm::LlmGateway;
use crate::source::SourceFile;
use crate::stages::{ExecContext, Stage};
use crate::tutorial::parse::parse_abstractions;
use crate::tutorial::prompts;
use crate::tutorial::state::{Abstraction, TutorialRequest, TutorialState};
use async_trait::async_trait;

/// Inputs of [`IdentifyAbstractions`].
#[derive(Debug, Clone)]
pub struct IdentifyInput {
    /// Project name.
    pub project: String,
    /// Caller options.
    pub request: TutorialRequest,
    /// Fetched files.
    pub files: Vec<SourceFile>,
}

/// Asks the provider for the core abstractions of the codebase.
#[derive(Debug, Clone)]
pub struct IdentifyAbstractions {
    gateway: LlmGateway,
}

impl IdentifyAbstractions {
    /// Creates the stage.
    #[must_use]
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Stage<TutorialState> for IdentifyAbstractions {
    type Prep = IdentifyInput;
    type Output = Vec<Abstraction>;

    fn name(&self) -> &str {
        IDENTIFY_ABSTRACTIONS
    }

    fn prep(&self, state: &TutorialState) -> Result<IdentifyInput> {
        if state.files.is_empty() {
            return Err(PreconditionError::new(IDENTIFY_ABSTRACTIONS, "files", "is empty").into());
        }
        let project = state
            .project_name
            .clone()
            .ok_or_else(|| PreconditionError::missing(IDENTIFY_ABSTRACTIONS, "project_name"))?;

        Ok(IdentifyInput {
            project,
            request: state.request.clone(),
            files: state.files.clone(),
        })
    }

    async fn exec(&self, prep: &IdentifyInput, ctx: ExecContext) -> Result<Vec<Abstraction>> {
        let prompt = prompts::identify_abstractions(&prep.project, &prep.request, &prep.files);
        let response = ask(&self.gateway, &prep.request, &prompt, ctx).await?;
        let abstractions = parse_abstractions(
            IDENTIFY_ABSTRACTIONS,
            &response,
            prep.files.len(),
            prep.request.max_abstractions,
        )?;
        tracing::info!(stage = IDENTIFY_ABSTRACTIONS, count = abstractions.len(), "Identified abstractions");
        Ok(abstractions)
    }

    fn post(&self, state: &mut TutorialState, _prep: IdentifyInput, output: Vec<Abstraction>) {
        state.abstractions = output;
    }
}
