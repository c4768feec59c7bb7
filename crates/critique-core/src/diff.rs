//! Diff-retrieval collaborator boundary.
//!
//! Turns a (repository URL, pull-request number) pair into the per-file
//! change set. Retrieval failure is the one error that aborts a whole run.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::DiffError;

/// File path -> unified diff text, produced once per run.
pub type ChangeSet = BTreeMap<String, String>;

#[async_trait]
pub trait DiffSource: Send + Sync {
    async fn pr_diff(&self, repo_url: &str, pr_number: u64) -> Result<ChangeSet, DiffError>;
}

/// Last path segment of a repository URL; used to address the run's stream.
pub fn repo_name_from_url(repo_url: &str) -> String {
    repo_url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .rsplit('/')
        .next()
        .unwrap_or(repo_url)
        .to_string()
}

fn owner_and_repo(repo_url: &str) -> Result<(String, String), DiffError> {
    let trimmed = repo_url.trim_end_matches('/').trim_end_matches(".git");
    let mut segments = trimmed.rsplit('/');
    let repo = segments.next().unwrap_or_default();
    let owner = segments.next().unwrap_or_default();
    if repo.is_empty() || owner.is_empty() || owner.contains(':') {
        return Err(DiffError::InvalidRepoUrl(repo_url.to_string()));
    }
    Ok((owner.to_string(), repo.to_string()))
}

/// Split one unified diff into per-file entries, keyed by the post-image path.
pub fn split_unified_diff(diff: &str) -> ChangeSet {
    let mut files = ChangeSet::new();
    let mut current: Option<(String, String)> = None;

    for line in diff.lines() {
        if line.starts_with("diff --git ") {
            if let Some((path, body)) = current.take() {
                files.insert(path, body);
            }
            let path = line
                .split_whitespace()
                .last()
                .map(|token| token.strip_prefix("b/").unwrap_or(token))
                .unwrap_or("")
                .to_string();
            current = Some((path, format!("{line}\n")));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }

    if let Some((path, body)) = current.take() {
        files.insert(path, body);
    }
    files
}

/// Fetches a pull request's unified diff from the GitHub API and splits it
/// into the per-file change set.
pub struct GithubDiffSource {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl GithubDiffSource {
    pub fn new(token: Option<String>) -> Self {
        Self::with_api_base("https://api.github.com", token)
    }

    pub fn with_api_base(api_base: &str, token: Option<String>) -> Self {
        GithubDiffSource {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait]
impl DiffSource for GithubDiffSource {
    async fn pr_diff(&self, repo_url: &str, pr_number: u64) -> Result<ChangeSet, DiffError> {
        let (owner, repo) = owner_and_repo(repo_url)?;
        let url = format!("{}/repos/{}/{}/pulls/{}", self.api_base, owner, repo, pr_number);

        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3.diff")
            .header("User-Agent", "critique");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DiffError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(DiffError::NotFound {
                repo_url: repo_url.to_string(),
                pr_number,
            });
        }
        if !status.is_success() {
            return Err(DiffError::Network(format!(
                "GitHub returned {status} for {url}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DiffError::Network(e.to_string()))?;
        Ok(split_unified_diff(&body))
    }
}
