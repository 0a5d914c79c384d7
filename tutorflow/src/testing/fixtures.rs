//! Fixture builders: sample sources and well-formed generative answers.

use std::fmt::Write;

use super::mocks::ScriptedProvider;
use crate::source::SourceFile;
use crate::tutorial::Abstraction;

const NAMES: &[&str] = &[
    "Command Entry",
    "Flow Engine",
    "Result Cache",
    "Provider Gateway",
    "Chapter Writer",
    "Source Reader",
    "Retry Policy",
];

/// Prompt fragment identifying the abstraction prompt.
pub const IDENTIFY_FRAGMENT: &str = "Identify the top";
/// Prompt fragment identifying the relationship prompt.
pub const RELATIONSHIPS_FRAGMENT: &str = "`from_abstraction`";
/// Prompt fragment identifying the ordering prompt.
pub const ORDER_FRAGMENT: &str = "best order to explain";
/// Prompt fragment identifying a chapter prompt.
pub const CHAPTER_FRAGMENT: &str = "Write a very beginner-friendly tutorial chapter";

/// Name of the `i`-th fixture abstraction.
#[must_use]
pub fn abstraction_name(i: usize) -> String {
    let base = NAMES[i % NAMES.len()];
    if i < NAMES.len() {
        base.to_string()
    } else {
        format!("{base} {}", i / NAMES.len() + 1)
    }
}

/// Three small source files.
#[must_use]
pub fn sample_files() -> Vec<SourceFile> {
    vec![
        SourceFile::new("app/cache.py", "class Cache:\n    def get(self, key): ...\n"),
        SourceFile::new("app/engine.py", "from app.cache import Cache\n\ndef run(flow): ...\n"),
        SourceFile::new("app/main.py", "from app.engine import run\n\nrun(None)\n"),
    ]
}

/// `n` abstractions spread over `file_count` files.
#[must_use]
pub fn sample_abstractions(n: usize, file_count: usize) -> Vec<Abstraction> {
    (0..n)
        .map(|i| Abstraction {
            name: abstraction_name(i),
            description: format!("How {} works.", abstraction_name(i)),
            files: vec![i % file_count.max(1)],
        })
        .collect()
}

/// A valid abstraction answer for `n` abstractions over `file_count` files.
#[must_use]
pub fn abstractions_response(n: usize, file_count: usize) -> String {
    let mut yaml = String::from("Here is the analysis.\n\n```yaml\n");
    for i in 0..n {
        let file = i % file_count.max(1);
        let _ = write!(
            yaml,
            "- name: |\n    {name}\n  description: |\n    {name} keeps one part of the system simple.\n  file_indices:\n    - {file} # file {file}\n",
            name = abstraction_name(i)
        );
    }
    yaml.push_str("```\n");
    yaml
}

/// A valid relationship answer over `n` abstractions: a ring plus one
/// self-loop that the parser must discard.
#[must_use]
pub fn relationships_response(n: usize) -> String {
    let mut yaml = String::from(
        "```yaml\nsummary: |\n  A **small tool** that turns code into a tutorial.\nrelationships:\n",
    );
    for i in 0..n {
        let to = (i + 1) % n.max(1);
        let _ = write!(
            yaml,
            "  - from_abstraction: {i} # {}\n    to_abstraction: {to} # {}\n    label: \"Feeds\"\n",
            abstraction_name(i),
            abstraction_name(to)
        );
    }
    yaml.push_str("  - from_abstraction: 0\n    to_abstraction: 0\n    label: \"Recurses\"\n```");
    yaml
}

/// An ordering answer listing `order`.
#[must_use]
pub fn order_response(order: &[usize]) -> String {
    let mut yaml = String::from("```yaml\n");
    for &i in order {
        let _ = writeln!(yaml, "- {i} # {}", abstraction_name(i));
    }
    yaml.push_str("```");
    yaml
}

/// A chapter body derived from the concept named in a chapter prompt.
#[must_use]
pub fn chapter_response(prompt: &str) -> String {
    let title = prompt
        .split("about the concept: \"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap_or("Unknown");
    format!("## {title}\n\nThis chapter explains {title} step by step.\n")
}

/// A provider answering every tutorial prompt for `n` abstractions over
/// the [`sample_files`], ordering chapters in reverse.
#[must_use]
pub fn tutorial_provider(n: usize) -> ScriptedProvider {
    let reversed: Vec<usize> = (0..n).rev().collect();
    ScriptedProvider::new()
        .on(IDENTIFY_FRAGMENT, abstractions_response(n, sample_files().len()))
        .on(RELATIONSHIPS_FRAGMENT, relationships_response(n))
        .on(ORDER_FRAGMENT, order_response(&reversed))
        .on_fn(CHAPTER_FRAGMENT, chapter_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tutorial::parse::{parse_abstractions, parse_chapter_order, parse_relationships};

    #[test]
    fn test_fixture_responses_parse() {
        let abstractions = parse_abstractions("t", &abstractions_response(5, 3), 3, 10).unwrap();
        assert_eq!(abstractions.len(), 5);
        assert_eq!(abstractions[1].name, "Flow Engine");

        let graph = parse_relationships("t", &relationships_response(5), 5).unwrap();
        assert_eq!(graph.relationships.len(), 5);

        assert_eq!(parse_chapter_order("t", &order_response(&[1, 0]), 2).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_chapter_response_uses_title() {
        let body = chapter_response("... about the concept: \"Flow Engine\". This is Chapter 2.");
        assert!(body.starts_with("## Flow Engine\n"));
    }

    #[test]
    fn test_abstraction_names_stay_unique() {
        let names: std::collections::HashSet<_> = (0..20).map(abstraction_name).collect();
        assert_eq!(names.len(), 20);
    }
}
