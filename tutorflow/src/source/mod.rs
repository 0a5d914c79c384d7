//! Source acquisition: turning a repository locator into a list of files.

mod filters;
#[cfg(feature = "http")]
mod github;
mod local;

pub use filters::{
    SourceFilters, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_INCLUDE_PATTERNS, DEFAULT_MAX_FILE_SIZE,
};
#[cfg(feature = "http")]
pub use github::{GithubRepo, GithubSource};
pub use local::LocalDirSource;

use crate::errors::SourceAcquisitionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One selected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    /// Full text content.
    pub content: String,
}

impl SourceFile {
    /// Creates a source file.
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Produces the files of a repository that pass the filters.
#[async_trait]
pub trait SourceAcquirer: Send + Sync + Debug {
    /// Human-readable locator (path or URL), used in errors and the index.
    fn locator(&self) -> String;

    /// Name used for the tutorial when none is given.
    fn project_name(&self) -> String {
        project_name_from(&self.locator())
    }

    /// Reads every selected file, ordered by path.
    ///
    /// Fails when the source is unreachable or nothing matched.
    async fn acquire(&self, filters: &SourceFilters) -> Result<Vec<SourceFile>, SourceAcquisitionError>;
}

/// Derives a project name from a repository URL or directory path: the
/// last path segment without a `.git` suffix.
#[must_use]
pub fn project_name_from(locator: &str) -> String {
    let trimmed = locator.trim().trim_end_matches(['/', '\\']);
    let last = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches(".git");
    if last.is_empty() || last == "." {
        "project".to_string()
    } else {
        last.to_string()
    }
}

fn finish(locator: &str, mut files: Vec<SourceFile>) -> Result<Vec<SourceFile>, SourceAcquisitionError> {
    if files.is_empty() {
        return Err(SourceAcquisitionError::new(
            locator,
            "no files matched the include/exclude patterns",
        ));
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!(source = locator, files = files.len(), "Fetched source files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_name_from_locator() {
        assert_eq!(project_name_from("https://github.com/acme/widgets"), "widgets");
        assert_eq!(project_name_from("https://github.com/acme/widgets.git"), "widgets");
        assert_eq!(project_name_from("/home/me/code/my-app/"), "my-app");
        assert_eq!(project_name_from("C:\\src\\tool"), "tool");
        assert_eq!(project_name_from("."), "project");
    }

    #[test]
    fn test_finish_sorts_and_rejects_empty() {
        let files = finish(
            "x",
            vec![SourceFile::new("b.py", ""), SourceFile::new("a.py", "")],
        )
        .unwrap();
        assert_eq!(files[0].path, "a.py");

        assert!(finish("x", Vec::new()).is_err());
    }
}
