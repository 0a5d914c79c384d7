//! Shared state threaded through the tutorial stages.

use crate::source::SourceFile;
use serde::{Deserialize, Serialize};

/// Default cap on identified abstractions.
pub const DEFAULT_MAX_ABSTRACTIONS: usize = 10;

/// Default output language.
pub const DEFAULT_LANGUAGE: &str = "english";

/// Run options supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialRequest {
    /// Project name. Derived from the source when absent.
    #[serde(default)]
    pub project_name: Option<String>,
    /// Language the tutorial is written in.
    #[serde(default = "default_language")]
    pub language: String,
    /// Upper bound on abstractions, and therefore chapters.
    #[serde(default = "default_max_abstractions")]
    pub max_abstractions: usize,
    /// Whether generative calls go through the cache.
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_max_abstractions() -> usize {
    DEFAULT_MAX_ABSTRACTIONS
}

fn default_true() -> bool {
    true
}

impl Default for TutorialRequest {
    fn default() -> Self {
        Self {
            project_name: None,
            language: default_language(),
            max_abstractions: DEFAULT_MAX_ABSTRACTIONS,
            use_cache: true,
        }
    }
}

impl TutorialRequest {
    /// Creates a request with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project name.
    #[must_use]
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = Some(name.into());
        self
    }

    /// Sets the output language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets the abstraction cap.
    #[must_use]
    pub fn with_max_abstractions(mut self, max: usize) -> Self {
        self.max_abstractions = max.max(1);
        self
    }

    /// Enables or disables the cache.
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Returns true when output is requested in a language other than English.
    #[must_use]
    pub fn is_translated(&self) -> bool {
        !self.language.trim().eq_ignore_ascii_case(DEFAULT_LANGUAGE)
    }

    /// Language name with a leading capital, as used in prompts.
    #[must_use]
    pub fn language_label(&self) -> String {
        let trimmed = self.language.trim();
        let mut chars = trimmed.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
        })
    }
}

/// A core concept identified in the codebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Abstraction {
    /// Short name.
    pub name: String,
    /// Beginner-friendly description.
    pub description: String,
    /// Indices into the fetched file list, sorted and unique.
    pub files: Vec<usize>,
}

/// A directed interaction between two abstractions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Source abstraction index.
    pub from: usize,
    /// Target abstraction index.
    pub to: usize,
    /// Short verb phrase describing the interaction.
    pub label: String,
}

/// Project summary plus the relationships between abstractions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelationshipGraph {
    /// High-level project summary.
    pub summary: String,
    /// Edges, never self-loops.
    pub relationships: Vec<Relationship>,
}

/// A written chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// One-based position in the tutorial.
    pub number: usize,
    /// The abstraction this chapter explains.
    pub abstraction: usize,
    /// Chapter title (the abstraction name).
    pub title: String,
    /// Output file name, `NN_safe_name.md`.
    pub filename: String,
    /// Markdown body, starting with the chapter heading.
    pub body: String,
}

/// Everything the tutorial stages read and write during one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TutorialState {
    /// Caller options.
    pub request: TutorialRequest,
    /// Resolved project name.
    pub project_name: Option<String>,
    /// Where the files came from (path or URL).
    pub source_locator: Option<String>,
    /// Selected source files, ordered by path.
    pub files: Vec<SourceFile>,
    /// Identified abstractions.
    pub abstractions: Vec<Abstraction>,
    /// Summary and relationships.
    pub relationships: Option<RelationshipGraph>,
    /// Abstraction indices in teaching order.
    pub chapter_order: Vec<usize>,
    /// Written chapters, in teaching order.
    pub chapters: Vec<Chapter>,
    /// Where the tutorial was written.
    pub output_location: Option<String>,
}

impl TutorialState {
    /// Creates a state for a request.
    #[must_use]
    pub fn new(request: TutorialRequest) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }

    /// File paths and contents for a set of indices, skipping unknown ones.
    #[must_use]
    pub fn files_at(&self, indices: &[usize]) -> Vec<(usize, &SourceFile)> {
        indices
            .iter()
            .filter_map(|&i| self.files.get(i).map(|f| (i, f)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = TutorialRequest::default();
        assert_eq!(request.language, "english");
        assert_eq!(request.max_abstractions, 10);
        assert!(request.use_cache);
        assert!(!request.is_translated());
    }

    #[test]
    fn test_language_label() {
        let request = TutorialRequest::new().with_language("sPANISH");
        assert!(request.is_translated());
        assert_eq!(request.language_label(), "Spanish");
        assert_eq!(TutorialRequest::new().with_language("English ").language_label(), "English");
    }

    #[test]
    fn test_files_at_skips_unknown() {
        let state = TutorialState {
            files: vec![SourceFile::new("a.py", "a"), SourceFile::new("b.py", "b")],
            ..TutorialState::default()
        };

        let selected = state.files_at(&[1, 7]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, 1);
        assert_eq!(selected[0].1.path, "b.py");
    }
}
