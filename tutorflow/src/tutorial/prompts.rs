//! Prompt builders for the generative stages.
//!
//! Prompts are plain strings. The same inputs always produce the same
//! prompt, which is what makes cached answers reusable across runs.

use super::state::{Abstraction, RelationshipGraph, TutorialRequest};
use crate::source::SourceFile;
use std::fmt::Write;

fn file_context<'a>(files: impl IntoIterator<Item = (usize, &'a SourceFile)>) -> String {
    let mut context = String::new();
    for (index, file) in files {
        let _ = write!(
            context,
            "--- File Index {index}: {} ---\n{}\n\n",
            file.path, file.content
        );
    }
    context
}

fn abstraction_listing(abstractions: &[Abstraction]) -> String {
    abstractions
        .iter()
        .enumerate()
        .map(|(i, a)| format!("- {i} # {}", a.name))
        .collect::<Vec<_>>()
        .join("\n")
}

fn language_note(request: &TutorialRequest, fields: &str) -> String {
    if request.is_translated() {
        format!(
            "IMPORTANT: Write the {fields} in **{}**. Do NOT use English for these fields.\n\n",
            request.language_label()
        )
    } else {
        String::new()
    }
}

/// Asks for the core abstractions of the codebase.
#[must_use]
pub fn identify_abstractions(project: &str, request: &TutorialRequest, files: &[SourceFile]) -> String {
    let listing = files
        .iter()
        .enumerate()
        .map(|(i, f)| format!("- {i} # {}", f.path))
        .collect::<Vec<_>>()
        .join("\n");
    let context = file_context(files.iter().enumerate());

    format!(
        "For the project `{project}`:\n\n\
         Codebase context:\n{context}\
         {note}\
         Identify the top 5-{max} most important abstractions a newcomer needs to understand this codebase.\n\n\
         For each abstraction, provide:\n\
         1. A concise `name`.\n\
         2. A beginner-friendly `description` of what it is, in around 100 words, using a simple analogy.\n\
         3. A list of relevant `file_indices` (integers or `idx # path`).\n\n\
         List of file indices and paths present in the context:\n{listing}\n\n\
         Format the output as a YAML list of dictionaries:\n\n\
         ```yaml\n\
         - name: |\n    Query Processing\n\
         \x20 description: |\n    Explains what the abstraction does.\n    It's like a central dispatcher routing requests.\n\
         \x20 file_indices:\n    - 0 # path/to/file1.py\n    - 3 # path/to/related.py\n\
         # ... up to {max} abstractions\n\
         ```",
        note = language_note(request, "`name` and `description`"),
        max = request.max_abstractions,
    )
}

/// Asks for a project summary and the relationships between abstractions.
#[must_use]
pub fn analyze_relationships(
    project: &str,
    request: &TutorialRequest,
    abstractions: &[Abstraction],
    files: &[(usize, &SourceFile)],
) -> String {
    let mut context = String::from("Identified Abstractions:\n");
    for (i, abstraction) in abstractions.iter().enumerate() {
        let indices = abstraction
            .files
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(
            context,
            "- Index {i}: {} (Relevant file indices: [{indices}])\n  Description: {}\n",
            abstraction.name, abstraction.description
        );
    }
    context.push_str("\nRelevant File Snippets (referenced by index and path):\n");
    context.push_str(&file_context(files.iter().copied()));

    format!(
        "Based on the following abstractions and relevant code snippets from the project `{project}`:\n\n\
         List of abstraction indices and names:\n{listing}\n\n\
         Context (abstractions, descriptions, code):\n{context}\
         {note}\
         Please provide:\n\
         1. A high-level `summary` of the project's main purpose and functionality in a few beginner-friendly sentences. Use markdown formatting with **bold** and *italic* text to highlight important concepts.\n\
         2. A list (`relationships`) describing the key interactions between these abstractions. For each relationship, specify:\n\
         \x20   - `from_abstraction`: index of the source abstraction (e.g. `0 # AbstractionName1`)\n\
         \x20   - `to_abstraction`: index of the target abstraction (e.g. `1 # AbstractionName2`)\n\
         \x20   - `label`: a brief label for the interaction in just a few words (e.g. \"Manages\", \"Inherits\", \"Uses\").\n\
         \x20   Ideally the relationship is backed by one abstraction calling or passing parameters to another.\n\
         \x20   Simplify the relationships and exclude those that are not important.\n\n\
         IMPORTANT: Make sure EVERY abstraction is involved in at least ONE relationship (either as source or target). Each abstraction index must appear at least once across all relationships.\n\n\
         Format the output as YAML:\n\n\
         ```yaml\n\
         summary: |\n  A brief, simple explanation of the project.\n  Can span multiple lines with **bold** and *italic* for emphasis.\n\
         relationships:\n\
         \x20 - from_abstraction: 0 # AbstractionName1\n    to_abstraction: 1 # AbstractionName2\n    label: \"Manages\"\n\
         \x20 # ... other relationships\n\
         ```\n\n\
         Now, provide the YAML output:",
        listing = abstraction_listing(abstractions),
        note = language_note(request, "`summary` and relationship `label` fields"),
    )
}

/// Asks for the teaching order of the abstractions.
#[must_use]
pub fn order_chapters(
    project: &str,
    request: &TutorialRequest,
    abstractions: &[Abstraction],
    graph: &RelationshipGraph,
) -> String {
    let mut context = format!("Project Summary:\n{}\n\nRelationships (Indices refer to abstractions above):\n", graph.summary);
    for relationship in &graph.relationships {
        let from = abstractions.get(relationship.from).map_or("?", |a| a.name.as_str());
        let to = abstractions.get(relationship.to).map_or("?", |a| a.name.as_str());
        let _ = writeln!(
            context,
            "- From {} ({from}) to {} ({to}): {}",
            relationship.from, relationship.to, relationship.label
        );
    }
    let note = if request.is_translated() {
        format!(
            "Note: the project summary might be in {}.\n\n",
            request.language_label()
        )
    } else {
        String::new()
    };

    format!(
        "Given the following project abstractions and their relationships for the project `{project}`:\n\n\
         Abstractions (Index # Name):\n{listing}\n\n\
         Context about relationships and project summary:\n{context}\n\
         {note}\
         If you are going to make a tutorial for `{project}`, what is the best order to explain these abstractions, from first to last?\n\
         Ideally, first explain those that are the most important or foundational, perhaps user-facing concepts or entry points. Then move to more detailed, lower-level implementation details or supporting concepts.\n\n\
         Output the ordered list of abstraction indices, including the name in a comment for clarity. Use the format `idx # AbstractionName`.\n\n\
         ```yaml\n\
         - 2 # FoundationalConcept\n\
         - 0 # CoreClassA\n\
         - 1 # CoreClassB (uses CoreClassA)\n\
         - ...\n\
         ```\n\n\
         Now, provide the YAML output:",
        listing = abstraction_listing(abstractions),
    )
}

/// Everything needed to write one chapter, independent of other chapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterBrief {
    /// Project name.
    pub project: String,
    /// One-based chapter number.
    pub number: usize,
    /// Abstraction index this chapter covers.
    pub abstraction: usize,
    /// Abstraction name, used as chapter title.
    pub title: String,
    /// Abstraction description.
    pub description: String,
    /// Output file name of this chapter.
    pub filename: String,
    /// Markdown list of all chapters with their file links.
    pub chapter_listing: String,
    /// Previous chapter as `(title, filename)`.
    pub previous: Option<(String, String)>,
    /// Next chapter as `(title, filename)`.
    pub next: Option<(String, String)>,
    /// Relevant source files as `(index, path, content)`.
    pub files: Vec<(usize, String, String)>,
}

/// Asks for the markdown body of one chapter.
#[must_use]
pub fn write_chapter(request: &TutorialRequest, brief: &ChapterBrief) -> String {
    let mut snippets = String::new();
    for (index, path, content) in &brief.files {
        let _ = write!(snippets, "--- File: {index} # {path} ---\n{content}\n\n");
    }
    if snippets.is_empty() {
        snippets.push_str("No specific code snippets provided for this abstraction.\n");
    }

    let neighbour = |link: &Option<(String, String)>, fallback: &str| {
        link.as_ref()
            .map_or_else(|| fallback.to_string(), |(title, file)| format!("[{title}]({file})"))
    };
    let language = if request.is_translated() {
        format!(
            "IMPORTANT: Write this ENTIRE tutorial chapter in **{}**. Translate all explanations, examples, terminology and comments into {}. Do NOT use English anywhere except in code syntax, required proper nouns, or when specified. The input context is already in {}.\n\n",
            request.language_label(),
            request.language_label(),
            request.language_label()
        )
    } else {
        String::new()
    };

    format!(
        "{language}\
         Write a very beginner-friendly tutorial chapter (in Markdown format) for the project `{project}` about the concept: \"{title}\". This is Chapter {number}.\n\n\
         Concept Details:\n\
         - Name: {title}\n\
         - Description:\n{description}\n\n\
         Complete Tutorial Structure:\n{listing}\n\n\
         Previous chapter: {previous}\n\
         Next chapter: {next}\n\n\
         Relevant Code Snippets (code itself remains unchanged):\n{snippets}\
         Instructions for the chapter:\n\
         - Start with a clear heading (e.g. `# Chapter {number}: {title}`).\n\
         - If there is a previous chapter, begin with a brief transition referencing it with a proper Markdown link.\n\
         - Begin with a high-level motivation explaining what problem this abstraction solves, with a concrete use case.\n\
         - Break complex abstractions into key concepts and explain each one at a time in a beginner-friendly way.\n\
         - Keep every code block BELOW 10 lines. Simplify aggressively and explain each block right after it.\n\
         - Describe the internal implementation with a minimal walkthrough and, where helpful, a simple mermaid `sequenceDiagram` with at most 5 participants.\n\
         - When referring to other core abstractions, use proper Markdown links taken from the tutorial structure above.\n\
         - Use analogies and examples throughout to help beginners.\n\
         - End with a brief conclusion and a transition to the next chapter, if there is one.\n\
         - Ensure the tone is welcoming and easy for a newcomer to understand.\n\
         - Output *only* the Markdown content for this chapter.\n\n\
         Now, directly provide a super beginner-friendly Markdown output (DON'T need ```markdown``` tags):",
        project = brief.project,
        title = brief.title,
        number = brief.number,
        description = brief.description,
        listing = brief.chapter_listing,
        previous = neighbour(&brief.previous, "none, this is the first chapter"),
        next = neighbour(&brief.next, "none, this is the last chapter"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tutorial::state::Relationship;

    fn files() -> Vec<SourceFile> {
        vec![
            SourceFile::new("main.py", "run()"),
            SourceFile::new("engine.py", "def run(): pass"),
        ]
    }

    fn abstractions() -> Vec<Abstraction> {
        vec![
            Abstraction {
                name: "Engine".to_string(),
                description: "Runs things.".to_string(),
                files: vec![1],
            },
            Abstraction {
                name: "Entry".to_string(),
                description: "Starts things.".to_string(),
                files: vec![0],
            },
        ]
    }

    #[test]
    fn test_identify_prompt_lists_files_and_limit() {
        let request = TutorialRequest::new().with_max_abstractions(7);
        let prompt = identify_abstractions("demo", &request, &files());

        assert!(prompt.contains("--- File Index 1: engine.py ---\ndef run(): pass"));
        assert!(prompt.contains("- 0 # main.py"));
        assert!(prompt.contains("top 5-7"));
        assert!(prompt.contains("```yaml"));
        assert!(!prompt.contains("Do NOT use English"));
    }

    #[test]
    fn test_prompts_are_deterministic() {
        let request = TutorialRequest::new();
        assert_eq!(
            identify_abstractions("demo", &request, &files()),
            identify_abstractions("demo", &request, &files())
        );
    }

    #[test]
    fn test_language_flows_into_prompts() {
        let request = TutorialRequest::new().with_language("french");
        let prompt = identify_abstractions("demo", &request, &files());
        assert!(prompt.contains("**French**"));

        let graph = RelationshipGraph {
            summary: "Un outil.".to_string(),
            relationships: vec![Relationship {
                from: 1,
                to: 0,
                label: "Lance".to_string(),
            }],
        };
        let order = order_chapters("demo", &request, &abstractions(), &graph);
        assert!(order.contains("might be in French"));
        assert!(order.contains("- From 1 (Entry) to 0 (Engine): Lance"));
    }

    #[test]
    fn test_relationship_prompt_includes_context() {
        let files = files();
        let selected: Vec<_> = files.iter().enumerate().collect();
        let prompt = analyze_relationships("demo", &TutorialRequest::new(), &abstractions(), &selected);

        assert!(prompt.contains("- Index 0: Engine (Relevant file indices: [1])"));
        assert!(prompt.contains("- 1 # Entry"));
        assert!(prompt.contains("from_abstraction"));
    }

    #[test]
    fn test_chapter_prompt_links_neighbours() {
        let brief = ChapterBrief {
            project: "demo".to_string(),
            number: 2,
            abstraction: 0,
            title: "Engine".to_string(),
            description: "Runs things.".to_string(),
            filename: "02_engine.md".to_string(),
            chapter_listing: "1. [Entry](01_entry.md)\n2. [Engine](02_engine.md)".to_string(),
            previous: Some(("Entry".to_string(), "01_entry.md".to_string())),
            next: None,
            files: vec![(1, "engine.py".to_string(), "def run(): pass".to_string())],
        };
        let prompt = write_chapter(&TutorialRequest::new(), &brief);

        assert!(prompt.contains("This is Chapter 2."));
        assert!(prompt.contains("Previous chapter: [Entry](01_entry.md)"));
        assert!(prompt.contains("Next chapter: none, this is the last chapter"));
        assert!(prompt.contains("--- File: 1 # engine.py ---"));
    }
}
