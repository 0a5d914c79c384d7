//! The six tutorial stages, in execution order.

mod analyze;
mod combine;
mod fetch;
mod identify;
mod order;
mod write;

pub use analyze::{AnalyzeRelationships, RelationshipInput};
pub use combine::CombineTutorial;
pub use fetch::{FetchRepo, FetchedSource};
pub use identify::{IdentifyAbstractions, IdentifyInput};
pub use order::{OrderChapters, OrderInput};
pub use write::WriteChapters;

use super::state::TutorialRequest;
use crate::errors::Result;
use crate::llm::{CacheMode, LlmGateway};
use crate::stages::ExecContext;

/// Stage name of [`FetchRepo`].
pub const FETCH_REPO: &str = "fetch_repo";
/// Stage name of [`IdentifyAbstractions`].
pub const IDENTIFY_ABSTRACTIONS: &str = "identify_abstractions";
/// Stage name of [`AnalyzeRelationships`].
pub const ANALYZE_RELATIONSHIPS: &str = "analyze_relationships";
/// Stage name of [`OrderChapters`].
pub const ORDER_CHAPTERS: &str = "order_chapters";
/// Stage name of [`WriteChapters`].
pub const WRITE_CHAPTERS: &str = "write_chapters";
/// Stage name of [`CombineTutorial`].
pub const COMBINE_TUTORIAL: &str = "combine_tutorial";

/// Sends a prompt through the gateway. Only the first attempt may be
/// answered from the cache, so a retry after a bad answer asks again.
/// Retries still record what they receive.
async fn ask(gateway: &LlmGateway, request: &TutorialRequest, prompt: &str, ctx: ExecContext) -> Result<String> {
    Ok(gateway.invoke_with(prompt, cache_mode(request, ctx)).await?)
}

fn cache_mode(request: &TutorialRequest, ctx: ExecContext) -> CacheMode {
    match (request.use_cache, ctx.is_first_attempt()) {
        (false, _) => CacheMode::Off,
        (true, true) => CacheMode::ReadWrite,
        (true, false) => CacheMode::WriteOnly,
    }
}
