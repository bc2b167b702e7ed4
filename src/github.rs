//! GitHub lookups: repository references, raw README retrieval and the
//! repository metadata API.
//!
//! README fetches go to the raw-content host and are not counted against the
//! API budget. Metadata calls go to the REST API, which is rate limited for
//! unauthenticated clients; callers pace and count those themselves.

use serde::Deserialize;
use std::fmt;
use tracing::debug;

use crate::config::GithubConfig;
use crate::fetch::{FetchError, HttpClient};

/// `owner/repo` pair parsed from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Parse `https://github.com/<owner>/<repo>[/...]`. Any other host, or a
    /// URL with fewer than two path segments, yields `None`.
    pub fn from_url(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let normalized = if raw.starts_with("//") {
            format!("https:{}", raw)
        } else if raw.starts_with("github.com/") || raw.starts_with("www.github.com/") {
            format!("https://{}", raw)
        } else {
            raw.to_string()
        };

        let url = url::Url::parse(&normalized).ok()?;
        let host = url.host_str()?;
        if host != "github.com" && host != "www.github.com" {
            return None;
        }

        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let owner = segments.next()?;
        let repo = segments.next()?;
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        if owner.is_empty() || repo.is_empty() {
            return None;
        }

        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LicenseInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub spdx_id: Option<String>,
}

/// The subset of the repository API response the enrichment pass uses.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RepoInfo {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub license: Option<LicenseInfo>,
    #[serde(default)]
    pub stargazers_count: Option<u64>,
    #[serde(default)]
    pub forks_count: Option<u64>,
    #[serde(default)]
    pub open_issues_count: Option<u64>,
    #[serde(default)]
    pub watchers_count: Option<u64>,
    #[serde(default)]
    pub pushed_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl RepoInfo {
    pub fn license_name(&self) -> Option<&str> {
        self.license.as_ref().and_then(|l| l.name.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct GithubClient {
    http: HttpClient,
    api_base: String,
    raw_base: String,
    branches: Vec<String>,
}

impl GithubClient {
    pub fn new(config: &GithubConfig, user_agent: &str) -> anyhow::Result<Self> {
        let http = HttpClient::new(
            user_agent,
            std::time::Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            raw_base: config.raw_base.trim_end_matches('/').to_string(),
            branches: config.branches.clone(),
        })
    }

    /// Candidate raw README URLs, one per configured branch, in order.
    pub fn readme_urls(&self, repo: &RepoRef) -> Vec<String> {
        self.branches
            .iter()
            .map(|branch| {
                format!(
                    "{}/{}/{}/{}/README.md",
                    self.raw_base, repo.owner, repo.repo, branch
                )
            })
            .collect()
    }

    pub fn repo_api_url(&self, repo: &RepoRef) -> String {
        format!("{}/repos/{}/{}", self.api_base, repo.owner, repo.repo)
    }

    /// README text from the first branch that has one. Failures are not
    /// errors: a repo without a reachable README simply has none.
    pub async fn fetch_readme(&self, repo: &RepoRef) -> Option<String> {
        for url in self.readme_urls(repo) {
            match self.http.get_optional_text(&url).await {
                Ok(Some(body)) => return Some(body),
                Ok(None) => debug!("no README at {}", url),
                Err(e) => debug!("README fetch failed: {}", e),
            }
        }
        None
    }

    /// Repository metadata; `Ok(None)` when the repository does not exist.
    pub async fn fetch_repo(&self, repo: &RepoRef) -> Result<Option<RepoInfo>, FetchError> {
        self.http.get_json::<RepoInfo>(&self.repo_api_url(repo)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repo_urls() {
        let r = RepoRef::from_url("https://github.com/acme/widget-mcp").unwrap();
        assert_eq!(r.to_string(), "acme/widget-mcp");

        let r = RepoRef::from_url("https://github.com/acme/widget.git").unwrap();
        assert_eq!(r.repo, "widget");

        let r = RepoRef::from_url("https://github.com/acme/mono/tree/main/servers/x").unwrap();
        assert_eq!((r.owner.as_str(), r.repo.as_str()), ("acme", "mono"));

        let r = RepoRef::from_url("//www.github.com/a/b?tab=readme").unwrap();
        assert_eq!(r.to_string(), "a/b");
    }

    #[test]
    fn rejects_non_repo_urls() {
        assert!(RepoRef::from_url("https://gitlab.com/a/b").is_none());
        assert!(RepoRef::from_url("https://github.com/acme").is_none());
        assert!(RepoRef::from_url("not a url").is_none());
    }

    #[test]
    fn readme_urls_follow_branch_order() {
        let client = GithubClient::new(&GithubConfig::default(), "test").unwrap();
        let repo = RepoRef::from_url("https://github.com/a/b").unwrap();
        assert_eq!(
            client.readme_urls(&repo),
            vec![
                "https://raw.githubusercontent.com/a/b/main/README.md",
                "https://raw.githubusercontent.com/a/b/master/README.md",
            ]
        );
        assert_eq!(client.repo_api_url(&repo), "https://api.github.com/repos/a/b");
    }

    #[test]
    fn repo_info_tolerates_missing_fields() {
        let info: RepoInfo = serde_json::from_str(
            r#"{"stargazers_count": 12000, "license": {"name": "MIT License", "spdx_id": "MIT"}, "extra": 1}"#,
        )
        .unwrap();
        assert_eq!(info.stargazers_count, Some(12000));
        assert_eq!(info.license_name(), Some("MIT License"));
        assert!(info.topics.is_empty());

        let info: RepoInfo = serde_json::from_str(r#"{"license": null}"#).unwrap();
        assert_eq!(info.license_name(), None);
    }
}
