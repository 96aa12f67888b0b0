//! Issue source abstraction
//!
//! The orchestrator and fetcher only talk to a hosting service through
//! [`IssueSource`], so tests can substitute an in-memory source and other
//! hosts can be added next to GitHub.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Comment, Issue, Reaction, RepoSpec};

/// Largest page size the GitHub REST API accepts
pub const MAX_PER_PAGE: u8 = 100;

/// Filters applied to one issue listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueQuery {
    /// Only issues updated at or after this instant
    pub since: Option<DateTime<Utc>>,
    pub include_closed: bool,
    pub per_page: u8,
}

impl IssueQuery {
    pub fn new(since: Option<DateTime<Utc>>, include_closed: bool) -> Self {
        Self {
            since,
            include_closed,
            per_page: MAX_PER_PAGE,
        }
    }
}

/// One page of issues, most recently updated first
#[derive(Debug, Clone, Default)]
pub struct IssuePage {
    pub issues: Vec<Issue>,
    /// Set when the source has nothing after this page
    pub is_last: bool,
}

/// Read-only access to a hosting service's repositories, issues and comments
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// List every repository owned by an organization (or user account)
    async fn list_org_repositories(&self, org: &str) -> Result<Vec<RepoSpec>>;

    /// Look up a single repository, mainly to learn its archived flag
    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoSpec>;

    /// Fetch one page (1-based) of issues sorted by last update, descending
    async fn list_issues_page(
        &self,
        repo: &RepoSpec,
        query: &IssueQuery,
        page: u32,
    ) -> Result<IssuePage>;

    /// Fetch all comments of an issue in chronological order
    async fn list_comments(&self, repo: &RepoSpec, issue_number: u64) -> Result<Vec<Comment>>;

    /// When an archived repository was archived, if the host records it
    async fn archived_at(&self, repo: &RepoSpec) -> Result<Option<DateTime<Utc>>>;

    /// Fetch every reaction on an issue, oldest first
    async fn list_issue_reactions(&self, repo: &RepoSpec, issue_number: u64)
        -> Result<Vec<Reaction>>;

    /// Fetch every reaction on a comment, oldest first
    async fn list_comment_reactions(&self, repo: &RepoSpec, comment_id: u64)
        -> Result<Vec<Reaction>>;

    /// Base URL of the API, used to key sync records
    fn api_url(&self) -> &str;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}
