//! Local directory source.

use super::{finish, SourceAcquirer, SourceFile, SourceFilters};
use crate::errors::SourceAcquisitionError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Reads matching files below a local directory.
#[derive(Debug, Clone)]
pub struct LocalDirSource {
    root: PathBuf,
}

impl LocalDirSource {
    /// Creates a source rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collect(root: &Path, filters: &SourceFilters) -> Result<Vec<SourceFile>, SourceAcquisitionError> {
        let locator = root.display().to_string();
        if !root.is_dir() {
            return Err(SourceAcquisitionError::new(locator, "not a directory"));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| SourceAcquisitionError::new(&locator, e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if !filters.matches(&relative) {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
            if !filters.within_size(size) {
                debug!(path = %relative, size, limit = filters.max_file_size(), "Skipping large file");
                continue;
            }

            match std::fs::read_to_string(entry.path()) {
                Ok(content) => files.push(SourceFile::new(relative, content)),
                Err(e) => debug!(path = %relative, error = %e, "Skipping unreadable file"),
            }
        }

        finish(&locator, files)
    }
}

#[async_trait]
impl SourceAcquirer for LocalDirSource {
    fn locator(&self) -> String {
        self.root.display().to_string()
    }

    fn project_name(&self) -> String {
        let absolute = std::fs::canonicalize(&self.root).unwrap_or_else(|_| self.root.clone());
        super::project_name_from(&absolute.display().to_string())
    }

    async fn acquire(&self, filters: &SourceFilters) -> Result<Vec<SourceFile>, SourceAcquisitionError> {
        let root = self.root.clone();
        let filters = filters.clone();
        tokio::task::spawn_blocking(move || Self::collect(&root, &filters))
            .await
            .map_err(|e| SourceAcquisitionError::new(self.locator(), e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_local_source_applies_filters() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "print('hi')");
        write(dir.path(), "pkg/util.py", "def f(): pass");
        write(dir.path(), "tests/test_app.py", "assert True");
        write(dir.path(), "notes.txt", "skip me");
        write(dir.path(), "big.py", &"x".repeat(200));

        let filters = SourceFilters::with_defaults(&[], &[], 100).unwrap();
        let files = LocalDirSource::new(dir.path()).acquire(&filters).await.unwrap();

        let source = LocalDirSource::new(dir.path().join("."));
        assert_eq!(
            source.project_name(),
            dir.path().file_name().unwrap().to_string_lossy()
        );

        let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["app.py", "pkg/util.py"]);
        assert_eq!(files[0].content, "print('hi')");
    }

    #[tokio::test]
    async fn test_local_source_no_matches_is_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "notes.txt", "nothing to see");

        let err = LocalDirSource::new(dir.path())
            .acquire(&SourceFilters::default())
            .await
            .unwrap_err();
        assert!(err.message.contains("no files matched"));
    }

    #[tokio::test]
    async fn test_local_source_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = LocalDirSource::new(dir.path().join("nope"))
            .acquire(&SourceFilters::default())
            .await
            .unwrap_err();
        assert_eq!(err.message, "not a directory");
    }
}
