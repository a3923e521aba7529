//! GitHub CLI repository search
//!
//! Wraps `gh search repos`, parsing its JSON output into typed summaries so
//! filtering and ordering happen in Rust rather than in a `jq` pipeline.

use super::command::{CommandError, CommandExecutor, CommandRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const SEARCH_FIELDS: &str =
    "fullName,description,stargazersCount,forksCount,language,url,updatedAt,isArchived";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("GitHub CLI (gh) is not installed or not on PATH")]
    GhMissing,
    #[error("GitHub authentication failed; run `gh auth login`")]
    AuthenticationFailed,
    #[error("GitHub search rate limit exceeded")]
    RateLimitExceeded,
    #[error("Search query is empty")]
    EmptyQuery,
    #[error("gh search failed: {message}")]
    Failed { message: String },
    #[error("Command execution error: {source}")]
    CommandError {
        #[from]
        source: CommandError,
    },
    #[error("Invalid response from GitHub CLI: {message}")]
    InvalidResponse { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Stars,
    Forks,
    Updated,
}

impl SortKey {
    fn as_gh_arg(self) -> &'static str {
        match self {
            SortKey::Stars => "stars",
            SortKey::Forks => "forks",
            SortKey::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub terms: Vec<String>,
    pub limit: u32,
    pub language: Option<String>,
    pub owner: Option<String>,
    pub min_stars: Option<u32>,
    pub sort: SortKey,
    pub include_archived: bool,
}

impl SearchQuery {
    /// Arguments passed to `gh`, excluding the program name.
    pub fn to_gh_args(&self) -> Vec<String> {
        let mut args = vec!["search".to_string(), "repos".to_string()];
        args.extend(self.terms.iter().cloned());
        args.push("--limit".to_string());
        args.push(self.limit.to_string());
        args.push("--sort".to_string());
        args.push(self.sort.as_gh_arg().to_string());
        args.push("--order".to_string());
        args.push("desc".to_string());
        if let Some(language) = &self.language {
            args.push("--language".to_string());
            args.push(language.clone());
        }
        if let Some(owner) = &self.owner {
            args.push("--owner".to_string());
            args.push(owner.clone());
        }
        if let Some(stars) = self.min_stars {
            args.push("--stars".to_string());
            args.push(format!(">={stars}"));
        }
        if !self.include_archived {
            args.push("--archived=false".to_string());
        }
        args.push("--json".to_string());
        args.push(SEARCH_FIELDS.to_string());
        args
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSummary {
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub language: Option<String>,
    pub url: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_archived: bool,
}

/// Repository search backend
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RepositorySearch: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RepoSummary>, SearchError>;
}

/// `gh`-backed search
pub struct GhRepositorySearch {
    executor: Arc<dyn CommandExecutor>,
}

impl GhRepositorySearch {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    fn classify_gh_error(stderr: &str) -> SearchError {
        let lowered = stderr.to_lowercase();
        if lowered.contains("authentication")
            || lowered.contains("not logged in")
            || lowered.contains("gh auth login")
        {
            SearchError::AuthenticationFailed
        } else if lowered.contains("rate limit") {
            SearchError::RateLimitExceeded
        } else {
            SearchError::Failed {
                message: stderr.trim().to_string(),
            }
        }
    }
}

#[async_trait]
impl RepositorySearch for GhRepositorySearch {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RepoSummary>, SearchError> {
        if query.terms.iter().all(|t| t.trim().is_empty()) {
            return Err(SearchError::EmptyQuery);
        }
        if self.executor.locate("gh").is_none() {
            return Err(SearchError::GhMissing);
        }

        let output = self
            .executor
            .execute(&CommandRequest::new("gh").args(query.to_gh_args()))
            .await?;
        if !output.success() {
            return Err(Self::classify_gh_error(&output.stderr));
        }

        let repos: Vec<RepoSummary> =
            serde_json::from_str(&output.stdout).map_err(|e| SearchError::InvalidResponse {
                message: e.to_string(),
            })?;
        tracing::debug!(count = repos.len(), "gh search returned repositories");

        Ok(refine(repos, query))
    }
}

/// Apply the filters `gh` cannot express and settle the final order.
pub fn refine(mut repos: Vec<RepoSummary>, query: &SearchQuery) -> Vec<RepoSummary> {
    repos.retain(|r| query.include_archived || !r.is_archived);
    if let Some(min) = query.min_stars {
        repos.retain(|r| r.stargazers_count >= u64::from(min));
    }
    match query.sort {
        SortKey::Stars => repos.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count)),
        SortKey::Forks => repos.sort_by(|a, b| b.forks_count.cmp(&a.forks_count)),
        SortKey::Updated => repos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
    }
    repos.truncate(query.limit as usize);
    repos
}
