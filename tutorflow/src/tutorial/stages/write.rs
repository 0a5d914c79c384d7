use super::{ask, WRITE_CHAPTERS};
use crate::errors::{PreconditionError, ResponseFormatError, Result};
use crate::llm::LlmGateway;
use crate::stages::{BatchStage, ExecContext};
use crate::tutorial::prompts::{self, ChapterBrief};
use crate::tutorial::render::{chapter_filename, normalize_heading};
use crate::tutorial::state::{Chapter, TutorialRequest, TutorialState};
use async_trait::async_trait;
use std::fmt::Write as _;

/// Writes one chapter per abstraction, in teaching order.
///
/// Each chapter is produced from its own brief, so chapters can be written
/// concurrently without changing the result.
#[derive(Debug, Clone)]
pub struct WriteChapters {
    gateway: LlmGateway,
}

impl WriteChapters {
    /// Creates the stage.
    #[must_use]
    pub fn new(gateway: LlmGateway) -> Self {
        Self { gateway }
    }
}

/// Builds one independent brief per chapter.
fn briefs(state: &TutorialState, project: &str) -> Result<Vec<ChapterBrief>> {
    let mut titled = Vec::with_capacity(state.chapter_order.len());
    for (position, &index) in state.chapter_order.iter().enumerate() {
        let abstraction = state.abstractions.get(index).ok_or_else(|| {
            PreconditionError::new(
                WRITE_CHAPTERS,
                "chapter_order",
                format!("refers to unknown abstraction {index}"),
            )
        })?;
        titled.push((index, abstraction, chapter_filename(position + 1, &abstraction.name)));
    }

    let mut listing = String::new();
    for (position, (_, abstraction, filename)) in titled.iter().enumerate() {
        let _ = writeln!(listing, "{}. [{}]({filename})", position + 1, abstraction.name);
    }

    let link = |position: Option<usize>| {
        position
            .and_then(|p| titled.get(p))
            .map(|(_, a, file)| (a.name.clone(), file.clone()))
    };

    Ok(titled
        .iter()
        .enumerate()
        .map(|(position, (index, abstraction, filename))| ChapterBrief {
            project: project.to_string(),
            number: position + 1,
            abstraction: *index,
            title: abstraction.name.clone(),
            description: abstraction.description.clone(),
            filename: filename.clone(),
            chapter_listing: listing.trim_end().to_string(),
            previous: link(position.checked_sub(1)),
            next: link(Some(position + 1)),
            files: state
                .files_at(&abstraction.files)
                .into_iter()
                .map(|(i, f)| (i, f.path.clone(), f.content.clone()))
                .collect(),
        })
        .collect())
}

#[async_trait]
impl BatchStage<TutorialState> for WriteChapters {
    type Item = (TutorialRequest, ChapterBrief);
    type ItemOutput = Chapter;

    fn name(&self) -> &str {
        WRITE_CHAPTERS
    }

    fn prep(&self, state: &TutorialState) -> Result<Vec<(TutorialRequest, ChapterBrief)>> {
        if state.chapter_order.is_empty() {
            return Err(PreconditionError::new(WRITE_CHAPTERS, "chapter_order", "is empty").into());
        }
        let project = state
            .project_name
            .as_deref()
            .ok_or_else(|| PreconditionError::missing(WRITE_CHAPTERS, "project_name"))?;

        Ok(briefs(state, project)?
            .into_iter()
            .map(|brief| (state.request.clone(), brief))
            .collect())
    }

    async fn exec_item(&self, item: &(TutorialRequest, ChapterBrief), ctx: ExecContext) -> Result<Chapter> {
        let (request, brief) = item;
        tracing::info!(stage = WRITE_CHAPTERS, chapter = brief.number, title = %brief.title, "Writing chapter");

        let prompt = prompts::write_chapter(request, brief);
        let response = ask(&self.gateway, request, &prompt, ctx).await?;
        if response.trim().is_empty() {
            return Err(ResponseFormatError::new(
                WRITE_CHAPTERS,
                format!("empty body for chapter {}", brief.number),
            )
            .into());
        }

        Ok(Chapter {
            number: brief.number,
            abstraction: brief.abstraction,
            title: brief.title.clone(),
            filename: brief.filename.clone(),
            body: normalize_heading(&response, brief.number, &brief.title),
        })
    }

    fn post(&self, state: &mut TutorialState, _items: Vec<(TutorialRequest, ChapterBrief)>, outputs: Vec<Chapter>) {
        state.chapters = outputs;
    }
}
