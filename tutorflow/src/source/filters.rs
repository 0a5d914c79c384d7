//! Include/exclude selection of repository files.

use crate::errors::ConfigError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;

/// Files considered source by default.
pub const DEFAULT_INCLUDE_PATTERNS: &[&str] = &[
    "*.py", "*.js", "*.jsx", "*.ts", "*.tsx", "*.go", "*.java", "*.pyi", "*.pyx", "*.c", "*.cc",
    "*.cpp", "*.h", "*.md", "*.rst", "Dockerfile", "Makefile", "*.yaml", "*.yml",
];

/// Paths skipped by default: tests, vendored trees, build output, VCS data.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "venv/*", ".venv/*", "*test*", "tests/*", "docs/*", "examples/*", "v1/*", "dist/*", "build/*",
    "experimental/*", "deprecated/*", "legacy/*", ".git/*", ".github/*", ".next/*", ".vscode/*",
    "obj/*", "bin/*", "node_modules/*", "*.log", "archive/*", "chat_history/*", "data/*",
    "vector_db/*",
];

/// Default size limit per file, in bytes.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100_000;

/// Compiled include/exclude globs plus a size limit.
///
/// Patterns follow shell conventions where `*` also crosses directory
/// separators, so `docs/*` excludes everything below `docs`. Include
/// patterns are tried against both the relative path and the bare file
/// name, so `Makefile` matches `tools/Makefile`.
#[derive(Debug, Clone)]
pub struct SourceFilters {
    include: GlobSet,
    exclude: GlobSet,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    max_file_size: u64,
}

impl SourceFilters {
    /// Compiles exactly the given patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid glob.
    pub fn new<I, E>(include: I, exclude: E, max_file_size: u64) -> Result<Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        let include_patterns: BTreeSet<String> = include.into_iter().map(Into::into).collect();
        let exclude_patterns: BTreeSet<String> = exclude.into_iter().map(Into::into).collect();

        Ok(Self {
            include: compile(&include_patterns)?,
            exclude: compile(&exclude_patterns)?,
            include_patterns: include_patterns.into_iter().collect(),
            exclude_patterns: exclude_patterns.into_iter().collect(),
            max_file_size,
        })
    }

    /// The default pattern sets unioned with caller-supplied extras.
    ///
    /// # Errors
    ///
    /// Returns an error if an extra pattern is not a valid glob.
    pub fn with_defaults(
        extra_include: &[String],
        extra_exclude: &[String],
        max_file_size: u64,
    ) -> Result<Self, ConfigError> {
        let include = DEFAULT_INCLUDE_PATTERNS
            .iter()
            .map(|p| (*p).to_string())
            .chain(extra_include.iter().cloned());
        let exclude = DEFAULT_EXCLUDE_PATTERNS
            .iter()
            .map(|p| (*p).to_string())
            .chain(extra_exclude.iter().cloned());
        Self::new(include, exclude, max_file_size)
    }

    /// Returns true if a `/`-separated relative path is selected.
    #[must_use]
    pub fn matches(&self, relative_path: &str) -> bool {
        if self.exclude.is_match(relative_path) {
            return false;
        }
        let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path);
        self.include.is_match(relative_path) || self.include.is_match(file_name)
    }

    /// Returns true if a file of `size` bytes is within the limit.
    #[must_use]
    pub fn within_size(&self, size: u64) -> bool {
        size <= self.max_file_size
    }

    /// The size limit in bytes.
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Include patterns, sorted.
    #[must_use]
    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    /// Exclude patterns, sorted.
    #[must_use]
    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }
}

impl Default for SourceFilters {
    fn default() -> Self {
        // The built-in pattern lists are known-valid globs.
        Self::with_defaults(&[], &[], DEFAULT_MAX_FILE_SIZE).unwrap_or_else(|_| Self {
            include: GlobSet::empty(),
            exclude: GlobSet::empty(),
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        })
    }
}

fn compile(patterns: &BTreeSet<String>) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::new(pattern, e.to_string()))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfigError::new("patterns", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns() {
        let filters = SourceFilters::default();

        assert!(filters.matches("main.py"));
        assert!(filters.matches("src/app/server.go"));
        assert!(filters.matches("deploy/Dockerfile"));
        assert!(filters.matches("README.md"));

        assert!(!filters.matches("src/lib.rs"));
        assert!(!filters.matches("tests/test_app.py"));
        assert!(!filters.matches("src/app_test.go"));
        assert!(!filters.matches("node_modules/pkg/index.js"));
        assert!(!filters.matches("docs/guide/intro.md"));
        assert!(!filters.matches(".github/workflows/ci.yml"));
    }

    #[test]
    fn test_extra_patterns_are_unioned() {
        let filters = SourceFilters::with_defaults(
            &["*.rs".to_string()],
            &["generated/*".to_string()],
            10,
        )
        .unwrap();

        assert!(filters.matches("src/lib.rs"));
        assert!(filters.matches("main.py"));
        assert!(!filters.matches("generated/api.rs"));
        assert!(filters.include_patterns().contains(&"*.rs".to_string()));
        assert!(filters.include_patterns().contains(&"*.py".to_string()));
    }

    #[test]
    fn test_size_limit() {
        let filters = SourceFilters::new(["*"], Vec::<String>::new(), 100).unwrap();
        assert!(filters.within_size(100));
        assert!(!filters.within_size(101));
        assert_eq!(filters.max_file_size(), 100);
    }

    #[test]
    fn test_invalid_glob() {
        let err = SourceFilters::new(["[unclosed"], Vec::<String>::new(), 1).unwrap_err();
        assert_eq!(err.origin, "[unclosed");
    }
}
