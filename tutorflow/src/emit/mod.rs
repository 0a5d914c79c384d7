//! Writing a finished tutorial to its destination.

mod fs;

pub use fs::FsEmitter;

use crate::errors::EmissionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Name of the index document.
pub const INDEX_FILE: &str = "index.md";

/// One output document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialFile {
    /// File name relative to the tutorial directory.
    pub filename: String,
    /// Markdown content.
    pub content: String,
}

impl TutorialFile {
    /// Creates an output document.
    #[must_use]
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// A rendered tutorial: the index plus one document per chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorialDocument {
    /// Project the tutorial is about; names the output directory.
    pub project_name: String,
    /// The index document.
    pub index: TutorialFile,
    /// Chapter documents, in reading order.
    pub chapters: Vec<TutorialFile>,
}

impl TutorialDocument {
    /// Index first, then chapters.
    pub fn files(&self) -> impl Iterator<Item = &TutorialFile> {
        std::iter::once(&self.index).chain(self.chapters.iter())
    }
}

/// Persists a rendered tutorial.
#[async_trait]
pub trait TutorialEmitter: Send + Sync + Debug {
    /// Writes every file and returns the destination (for example, a
    /// directory path).
    async fn emit(&self, document: &TutorialDocument) -> Result<String, EmissionError>;
}
