//! GitHub repository source, read through the REST API.

use super::{finish, SourceAcquirer, SourceFile, SourceFilters};
use crate::errors::SourceAcquisitionError;
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("tutorflow/", env!("CARGO_PKG_VERSION"));

/// Owner, repository, and optional ref and subdirectory parsed from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubRepo {
    /// Account or organisation.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch, tag or commit. `None` means the default branch.
    pub git_ref: Option<String>,
    /// Subdirectory to restrict to, without slashes at either end.
    pub subdir: Option<String>,
}

impl GithubRepo {
    /// Parses `https://github.com/<owner>/<repo>[.git][/tree/<ref>[/<subdir>]]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not name a GitHub repository.
    pub fn parse(url: &str) -> Result<Self, SourceAcquisitionError> {
        let invalid = || SourceAcquisitionError::new(url, "not a GitHub repository URL");

        let rest = url
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("www.")
            .strip_prefix("github.com/")
            .ok_or_else(invalid)?;

        let mut parts = rest.trim_end_matches('/').split('/').filter(|p| !p.is_empty());
        let owner = parts.next().ok_or_else(invalid)?.to_string();
        let repo = parts
            .next()
            .ok_or_else(invalid)?
            .trim_end_matches(".git")
            .to_string();

        let (git_ref, subdir) = match parts.next() {
            Some("tree" | "blob") => {
                let git_ref = parts.next().map(str::to_string);
                let subdir: Vec<&str> = parts.collect();
                (git_ref, (!subdir.is_empty()).then(|| subdir.join("/")))
            }
            _ => (None, None),
        };

        Ok(Self {
            owner,
            repo,
            git_ref,
            subdir,
        })
    }
}

/// Reads matching files from a GitHub repository.
#[derive(Clone)]
pub struct GithubSource {
    url: String,
    repo: GithubRepo,
    token: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GithubSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubSource")
            .field("url", &self.url)
            .field("repo", &self.repo)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Deserialize)]
struct Tree {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
}

#[derive(Deserialize)]
struct Contents {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

impl GithubSource {
    /// Creates a source for a repository URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not a GitHub repository URL.
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self, SourceAcquisitionError> {
        let url = url.into();
        let repo = GithubRepo::parse(&url)?;
        Ok(Self {
            url,
            repo,
            token: token.filter(|t| !t.trim().is_empty()),
            api_base: API_BASE.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Points the source at another API host, such as GitHub Enterprise.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// The parsed repository coordinates.
    #[must_use]
    pub fn repo(&self) -> &GithubRepo {
        &self.repo
    }

    fn error(&self, message: impl Into<String>) -> SourceAcquisitionError {
        SourceAcquisitionError::new(&self.url, message)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceAcquisitionError> {
        let mut request = self
            .client
            .get(format!("{}{path}", self.api_base))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.error(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let hint = if status.as_u16() == 403 && self.token.is_none() {
                " (rate limited? set GITHUB_TOKEN)"
            } else {
                ""
            };
            return Err(self.error(format!("GET {path} returned HTTP {status}{hint}")));
        }
        response
            .json()
            .await
            .map_err(|e| self.error(format!("unreadable response for {path}: {e}")))
    }

    async fn fetch_file(&self, path: &str, git_ref: &str) -> Result<String, SourceAcquisitionError> {
        let GithubRepo { owner, repo, .. } = &self.repo;
        let contents: Contents = self
            .get(&format!("/repos/{owner}/{repo}/contents/{path}?ref={git_ref}"))
            .await?;
        if contents.encoding != "base64" {
            return Err(self.error(format!("{path}: unsupported encoding '{}'", contents.encoding)));
        }

        let packed: String = contents.content.split_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(packed)
            .map_err(|e| self.error(format!("{path}: {e}")))?;
        String::from_utf8(bytes).map_err(|_| self.error(format!("{path}: not UTF-8 text")))
    }
}

#[async_trait]
impl SourceAcquirer for GithubSource {
    fn locator(&self) -> String {
        self.url.clone()
    }

    fn project_name(&self) -> String {
        self.repo.repo.clone()
    }

    async fn acquire(&self, filters: &SourceFilters) -> Result<Vec<SourceFile>, SourceAcquisitionError> {
        if self.token.is_none() {
            warn!(url = %self.url, "No GitHub token provided; public API rate limits apply");
        }
        let GithubRepo {
            owner,
            repo,
            git_ref,
            subdir,
        } = &self.repo;

        let git_ref = match git_ref {
            Some(git_ref) => git_ref.clone(),
            None => {
                let info: RepoInfo = self.get(&format!("/repos/{owner}/{repo}")).await?;
                info.default_branch
            }
        };

        let tree: Tree = self
            .get(&format!("/repos/{owner}/{repo}/git/trees/{git_ref}?recursive=1"))
            .await?;
        if tree.truncated {
            warn!(url = %self.url, "Repository tree listing was truncated by the API");
        }

        let prefix = subdir.as_ref().map(|s| format!("{s}/"));
        let mut files = Vec::new();
        for entry in tree.tree.into_iter().filter(|e| e.kind == "blob") {
            let relative = match &prefix {
                Some(prefix) => match entry.path.strip_prefix(prefix.as_str()) {
                    Some(relative) => relative.to_string(),
                    None => continue,
                },
                None => entry.path.clone(),
            };
            if !filters.matches(&relative) {
                continue;
            }
            if !filters.within_size(entry.size) {
                debug!(path = %relative, size = entry.size, "Skipping large file");
                continue;
            }

            match self.fetch_file(&entry.path, &git_ref).await {
                Ok(content) => files.push(SourceFile::new(relative, content)),
                Err(e) => warn!(path = %entry.path, error = %e, "Skipping file"),
            }
        }

        finish(&self.url, files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plain_url() {
        let repo = GithubRepo::parse("https://github.com/acme/widgets").unwrap();
        assert_eq!(
            repo,
            GithubRepo {
                owner: "acme".to_string(),
                repo: "widgets".to_string(),
                git_ref: None,
                subdir: None,
            }
        );
    }

    #[test]
    fn test_parse_git_suffix_and_trailing_slash() {
        let repo = GithubRepo::parse("https://github.com/acme/widgets.git/").unwrap();
        assert_eq!(repo.repo, "widgets");
    }

    #[test]
    fn test_parse_tree_url() {
        let repo = GithubRepo::parse("https://github.com/acme/widgets/tree/v2/src/core").unwrap();
        assert_eq!(repo.git_ref.as_deref(), Some("v2"));
        assert_eq!(repo.subdir.as_deref(), Some("src/core"));
    }

    #[test]
    fn test_parse_rejects_other_hosts() {
        assert!(GithubRepo::parse("https://gitlab.com/acme/widgets").is_err());
        assert!(GithubRepo::parse("https://github.com/acme").is_err());
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let source = GithubSource::new("https://github.com/acme/widgets", Some("  ".to_string())).unwrap();
        assert!(source.token.is_none());
        assert_eq!(source.locator(), "https://github.com/acme/widgets");
        assert_eq!(source.project_name(), "widgets");
    }
}
