//! Markdown rendering of the finished tutorial.

use super::state::{Abstraction, Chapter, Relationship};
use crate::emit::{TutorialDocument, TutorialFile, INDEX_FILE};
use std::fmt::Write;

/// Footer appended to every generated document.
pub const ATTRIBUTION: &str = "Generated by tutorflow";

/// Replaces every non-alphanumeric character with `_` and lowercases.
#[must_use]
pub fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase()
}

/// `NN_safe_name.md` for a one-based chapter number.
#[must_use]
pub fn chapter_filename(number: usize, title: &str) -> String {
    format!("{number:02}_{}.md", safe_name(title))
}

/// Ensures the body starts with `# Chapter N: Title`.
///
/// A leading markdown heading is replaced; otherwise the heading is
/// prepended.
#[must_use]
pub fn normalize_heading(body: &str, number: usize, title: &str) -> String {
    let heading = format!("# Chapter {number}: {title}");
    let trimmed = body.trim_start();
    match trimmed.split_once('\n') {
        Some((first, rest)) if first.trim_start().starts_with('#') => format!("{heading}\n{rest}"),
        None if trimmed.starts_with('#') => format!("{heading}\n"),
        _ => format!("{heading}\n\n{trimmed}"),
    }
}

fn quoted(text: &str) -> String {
    text.replace('"', "'")
}

/// Renders the relationship graph as a mermaid flowchart.
#[must_use]
pub fn render_mermaid(abstractions: &[Abstraction], relationships: &[Relationship]) -> String {
    let mut diagram = String::from("flowchart TD\n");
    for (i, abstraction) in abstractions.iter().enumerate() {
        let _ = writeln!(diagram, "    A{i}[\"{}\"]", quoted(&abstraction.name));
    }
    for relationship in relationships {
        let _ = writeln!(
            diagram,
            "    A{} -- \"{}\" --> A{}",
            relationship.from,
            quoted(&relationship.label),
            relationship.to
        );
    }
    diagram
}

/// Inputs to the index document.
#[derive(Debug, Clone, Copy)]
pub struct IndexView<'a> {
    /// Project name.
    pub project: &'a str,
    /// Project summary.
    pub summary: &'a str,
    /// Source path or URL.
    pub source: Option<&'a str>,
    /// All abstractions.
    pub abstractions: &'a [Abstraction],
    /// Relationships between them.
    pub relationships: &'a [Relationship],
    /// Chapters in reading order.
    pub chapters: &'a [Chapter],
}

fn footer() -> String {
    format!("\n\n---\n\n{ATTRIBUTION}")
}

/// Renders `index.md`.
#[must_use]
pub fn render_index(view: &IndexView<'_>) -> String {
    let mut index = format!("# Tutorial: {}\n\n{}\n\n", view.project, view.summary.trim());

    match view.source {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            let _ = write!(index, "**Source Repository:** [{url}]({url})\n\n");
        }
        Some(path) => {
            let _ = write!(index, "**Source Directory:** `{path}`\n\n");
        }
        None => {}
    }

    let _ = write!(
        index,
        "```mermaid\n{}```\n\n## Chapters\n\n",
        render_mermaid(view.abstractions, view.relationships)
    );
    for chapter in view.chapters {
        let _ = writeln!(index, "{}. [{}]({})", chapter.number, chapter.title, chapter.filename);
    }

    index.push_str(&footer());
    index
}

/// Renders a chapter file: the body plus the footer.
#[must_use]
pub fn render_chapter(chapter: &Chapter) -> String {
    format!("{}{}", chapter.body.trim_end(), footer())
}

/// Renders the complete tutorial.
#[must_use]
pub fn render_document(view: &IndexView<'_>) -> TutorialDocument {
    TutorialDocument {
        project_name: view.project.to_string(),
        index: TutorialFile::new(INDEX_FILE, render_index(view)),
        chapters: view
            .chapters
            .iter()
            .map(|c| TutorialFile::new(&c.filename, render_chapter(c)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_safe_name_and_filename() {
        assert_eq!(safe_name("Flow Engine (Core)"), "flow_engine__core_");
        assert_eq!(chapter_filename(3, "LLM Gateway"), "03_llm_gateway.md");
        assert_eq!(chapter_filename(12, "Cache"), "12_cache.md");
    }

    #[test]
    fn test_normalize_heading_replaces_existing() {
        let body = "## The Engine\n\nText here.";
        assert_eq!(
            normalize_heading(body, 2, "Engine"),
            "# Chapter 2: Engine\n\nText here."
        );
    }

    #[test]
    fn test_normalize_heading_prepends_when_missing() {
        assert_eq!(
            normalize_heading("Just text.", 1, "Cache"),
            "# Chapter 1: Cache\n\nJust text."
        );
        assert_eq!(normalize_heading("# Only", 4, "X"), "# Chapter 4: X\n");
    }

    #[test]
    fn test_render_mermaid() {
        let abstractions = vec![
            Abstraction {
                name: "Flow \"Engine\"".to_string(),
                description: String::new(),
                files: vec![],
            },
            Abstraction {
                name: "Cache".to_string(),
                description: String::new(),
                files: vec![],
            },
        ];
        let relationships = vec![Relationship {
            from: 0,
            to: 1,
            label: "Reads".to_string(),
        }];

        assert_eq!(
            render_mermaid(&abstractions, &relationships),
            "flowchart TD\n    A0[\"Flow 'Engine'\"]\n    A1[\"Cache\"]\n    A0 -- \"Reads\" --> A1\n"
        );
    }

    #[test]
    fn test_render_document() {
        let abstractions = vec![Abstraction {
            name: "Cache".to_string(),
            description: "Stores.".to_string(),
            files: vec![0],
        }];
        let chapters = vec![Chapter {
            number: 1,
            abstraction: 0,
            title: "Cache".to_string(),
            filename: "01_cache.md".to_string(),
            body: "# Chapter 1: Cache\n\nBody.\n".to_string(),
        }];
        let view = IndexView {
            project: "demo",
            summary: "A demo.",
            source: Some("https://github.com/o/demo"),
            abstractions: &abstractions,
            relationships: &[],
            chapters: &chapters,
        };

        let document = render_document(&view);
        assert_eq!(document.project_name, "demo");
        assert_eq!(document.index.filename, "index.md");
        assert!(document.index.content.starts_with("# Tutorial: demo\n\nA demo.\n\n"));
        assert!(document
            .index
            .content
            .contains("**Source Repository:** [https://github.com/o/demo](https://github.com/o/demo)"));
        assert!(document.index.content.contains("```mermaid\nflowchart TD\n"));
        assert!(document.index.content.contains("1. [Cache](01_cache.md)\n"));
        assert!(document.index.content.ends_with(ATTRIBUTION));
        assert_eq!(
            document.chapters[0].content,
            format!("# Chapter 1: Cache\n\nBody.\n\n---\n\n{ATTRIBUTION}")
        );
    }
}
