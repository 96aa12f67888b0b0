//! GitHub implementation of [`IssueSource`]
//!
//! Repository metadata goes through octocrab's typed models. Issues,
//! comments and reactions are read from the REST routes into small wire
//! structs and converted into the crate's own records, dropping pull
//! requests on the way. The archive date of a repository is only exposed
//! through GraphQL. Every octocrab failure is mapped onto [`ArchiveError`]
//! by [`classify`].

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use octocrab::models::Repository;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, Result};
use crate::models::{
    normalize_line_endings, Comment, Issue, IssueState, Label, Reaction, RepoSpec,
};
use crate::source::{IssuePage, IssueQuery, IssueSource, MAX_PER_PAGE};

/// Public GitHub API endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com/";

/// Login shown for content whose author account was deleted
const GHOST_LOGIN: &str = "ghost";

/// GitHub client wrapper holding the configured endpoint and credential
#[derive(Debug)]
pub struct GitHubClient {
    client: Octocrab,
    api_url: String,
    username: Option<String>,
}

impl GitHubClient {
    /// Create a new GitHub client and verify the token
    ///
    /// Only an outright credential rejection fails construction; other
    /// failures of the check are logged, since some token types cannot
    /// read the authenticated user.
    pub async fn new(token: &str, api_url: &str) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(ArchiveError::Configuration(
                "GitHub token must not be empty".to_string(),
            ));
        }

        let client = Octocrab::builder()
            .base_uri(api_url)
            .map_err(|e| {
                ArchiveError::Configuration(format!("Invalid API URL '{}': {}", api_url, e))
            })?
            .personal_token(token.to_string())
            .build()
            .map_err(|e| {
                ArchiveError::Configuration(format!("Failed to create GitHub client: {}", e))
            })?;

        let username = match client.get::<WireUser, _, ()>("/user", None).await {
            Ok(user) => {
                info!("Authenticated as GitHub user: {}", user.login);
                Some(user.login)
            }
            Err(e) => match classify(e, "credential check") {
                ArchiveError::Auth(message) => return Err(ArchiveError::Auth(message)),
                other => {
                    warn!("Could not verify GitHub credential, continuing: {}", other);
                    None
                }
            },
        };

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            username,
        })
    }

    /// Get the authenticated username, if the credential check could read it
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// List repositories for a specific organization
    async fn list_organization_repositories(&self, org: &str) -> Result<Vec<Repository>> {
        debug!("Fetching repositories for organization: {}", org);

        let repositories = self
            .get_all_pages(
                format!("/orgs/{}/repos", org),
                &format!("repositories of organization {}", org),
            )
            .await?;

        info!(
            "Found {} repositories for organization: {}",
            repositories.len(),
            org
        );
        Ok(repositories)
    }

    /// List public repositories owned by a user account
    async fn list_user_repositories(&self, user: &str) -> Result<Vec<Repository>> {
        debug!("Fetching repositories for user: {}", user);

        let repositories = self
            .get_all_pages(
                format!("/users/{}/repos", user),
                &format!("repositories of user {}", user),
            )
            .await?;

        info!("Found {} repositories for user: {}", repositories.len(), user);
        Ok(repositories)
    }

    /// Fetch a paginated listing until the first short page
    async fn get_all_pages<T>(&self, route: String, what: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let params = PageParams {
                per_page: MAX_PER_PAGE,
                page,
            };
            let batch: Vec<T> = self
                .client
                .get(&route, Some(&params))
                .await
                .map_err(|e| classify(e, &format!("{} page {}", what, page)))?;

            let is_last = batch.len() < MAX_PER_PAGE as usize;
            items.extend(batch);
            if is_last {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// Convert octocrab Repository to our RepoSpec
    fn repo_to_spec(repo: &Repository, fallback_owner: &str) -> RepoSpec {
        let owner = repo
            .owner
            .as_ref()
            .map(|o| o.login.clone())
            .or_else(|| {
                repo.full_name
                    .as_deref()
                    .and_then(|full| full.split_once('/'))
                    .map(|(owner, _)| owner.to_string())
            })
            .unwrap_or_else(|| fallback_owner.to_string());

        RepoSpec::new(owner, repo.name.clone()).archived(repo.archived.unwrap_or(false))
    }
}

#[async_trait]
impl IssueSource for GitHubClient {
    async fn list_org_repositories(&self, org: &str) -> Result<Vec<RepoSpec>> {
        let repositories = match self.list_organization_repositories(org).await {
            Err(ArchiveError::NotFound(_)) => {
                debug!("{} is not an organization, trying user repositories", org);
                self.list_user_repositories(org).await.map_err(|e| match e {
                    ArchiveError::NotFound(_) => ArchiveError::NotFound(format!(
                        "organization or user '{}' does not exist or is not accessible",
                        org
                    )),
                    other => other,
                })?
            }
            other => other?,
        };

        Ok(repositories
            .iter()
            .map(|repo| Self::repo_to_spec(repo, org))
            .collect())
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoSpec> {
        let repo = self
            .client
            .repos(owner, name)
            .get()
            .await
            .map_err(|e| classify(e, &format!("repository {}/{}", owner, name)))?;

        Ok(Self::repo_to_spec(&repo, owner))
    }

    async fn list_issues_page(
        &self,
        repo: &RepoSpec,
        query: &IssueQuery,
        page: u32,
    ) -> Result<IssuePage> {
        let params = IssueListParams {
            state: if query.include_closed { "all" } else { "open" },
            sort: "updated",
            direction: "desc",
            since: query
                .since
                .map(|since| since.to_rfc3339_opts(SecondsFormat::Secs, true)),
            per_page: query.per_page,
            page,
        };

        debug!("Fetching issues of {} page {}", repo, page);

        let raw: Vec<WireIssue> = self
            .client
            .get(
                format!("/repos/{}/{}/issues", repo.owner, repo.name),
                Some(&params),
            )
            .await
            .map_err(|e| classify(e, &format!("issues of {} page {}", repo, page)))?;

        // Pull requests count towards the page size but are not archived
        let is_last = raw.len() < query.per_page as usize;
        let issues = raw
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(Issue::from)
            .collect();

        Ok(IssuePage { issues, is_last })
    }

    async fn list_comments(&self, repo: &RepoSpec, issue_number: u64) -> Result<Vec<Comment>> {
        let raw: Vec<WireComment> = self
            .get_all_pages(
                format!(
                    "/repos/{}/{}/issues/{}/comments",
                    repo.owner, repo.name, issue_number
                ),
                &format!("comments of {}#{}", repo, issue_number),
            )
            .await?;
        let comments: Vec<Comment> = raw.into_iter().map(Comment::from).collect();

        debug!(
            "Fetched {} comments for {}#{}",
            comments.len(),
            repo,
            issue_number
        );
        Ok(comments)
    }

    async fn archived_at(&self, repo: &RepoSpec) -> Result<Option<DateTime<Utc>>> {
        let payload = serde_json::json!({
            "query": ARCHIVED_AT_QUERY,
            "variables": { "owner": repo.owner, "name": repo.name },
        });

        let response: GraphQlResponse<ArchivedAtData> = self
            .client
            .graphql(&payload)
            .await
            .map_err(|e| classify(e, &format!("archive date of {}", repo)))?;

        match response.data.and_then(|data| data.repository) {
            Some(found) => Ok(found.archived_at),
            None => Err(ArchiveError::NotFound(format!(
                "archive date of {}: {}",
                repo,
                response
                    .errors
                    .first()
                    .map(|e| e.message.as_str())
                    .unwrap_or("repository missing from response")
            ))),
        }
    }

    async fn list_issue_reactions(
        &self,
        repo: &RepoSpec,
        issue_number: u64,
    ) -> Result<Vec<Reaction>> {
        let raw: Vec<WireReaction> = self
            .get_all_pages(
                format!(
                    "/repos/{}/{}/issues/{}/reactions",
                    repo.owner, repo.name, issue_number
                ),
                &format!("reactions of {}#{}", repo, issue_number),
            )
            .await?;
        Ok(raw.into_iter().map(Reaction::from).collect())
    }

    async fn list_comment_reactions(
        &self,
        repo: &RepoSpec,
        comment_id: u64,
    ) -> Result<Vec<Reaction>> {
        let raw: Vec<WireReaction> = self
            .get_all_pages(
                format!(
                    "/repos/{}/{}/issues/comments/{}/reactions",
                    repo.owner, repo.name, comment_id
                ),
                &format!("reactions of comment {} in {}", comment_id, repo),
            )
            .await?;
        Ok(raw.into_iter().map(Reaction::from).collect())
    }

    fn api_url(&self) -> &str {
        &self.api_url
    }

    fn provider_name(&self) -> &'static str {
        "GitHub"
    }
}

/// Map an octocrab failure onto the archive error taxonomy
fn classify(err: octocrab::Error, what: &str) -> ArchiveError {
    match &err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            let message = &source.message;
            match status {
                401 => ArchiveError::Auth(format!("{}: {}", what, message)),
                404 => ArchiveError::NotFound(format!("{}: {}", what, message)),
                403 if is_rate_limit_message(message) => {
                    ArchiveError::Transient(format!("{}: {}", what, message))
                }
                403 => ArchiveError::NotFound(format!("{}: access denied ({})", what, message)),
                _ => ArchiveError::Transient(format!("{}: HTTP {} {}", what, status, message)),
            }
        }
        _ => ArchiveError::Transient(format!("{}: {}", what, err)),
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    message.to_lowercase().contains("rate limit")
}

/// Emoji for a REST reaction content name; unknown names are kept as they are
fn reaction_emoji(content: &str) -> String {
    let emoji = match content {
        "+1" => "👍",
        "-1" => "👎",
        "laugh" => "😀",
        "hooray" => "🎉",
        "confused" => "😕",
        "heart" => "❤️",
        "rocket" => "🚀",
        "eyes" => "👀",
        other => other,
    };
    emoji.to_string()
}

const ARCHIVED_AT_QUERY: &str =
    "query($owner: String!, $name: String!) { repository(owner: $owner, name: $name) { archivedAt } }";

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

#[derive(Debug, Serialize)]
struct IssueListParams {
    state: &'static str,
    sort: &'static str,
    direction: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<String>,
    per_page: u8,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct WireLabel {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

/// The subset of the REST issue payload that gets archived
#[derive(Debug, Deserialize)]
struct WireIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    state_reason: Option<String>,
    #[serde(default)]
    user: Option<WireUser>,
    html_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    labels: Vec<WireLabel>,
    #[serde(default)]
    assignees: Vec<WireUser>,
    #[serde(default)]
    comments: u32,
    #[serde(default)]
    reactions: Option<WireReactionRollup>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    user: Option<WireUser>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    reactions: Option<WireReactionRollup>,
}

/// Reaction summary embedded in issue and comment payloads
#[derive(Debug, Deserialize)]
struct WireReactionRollup {
    #[serde(default)]
    total_count: u32,
}

fn reaction_total(rollup: Option<WireReactionRollup>) -> u32 {
    rollup.map(|r| r.total_count).unwrap_or(0)
}

#[derive(Debug, Deserialize)]
struct WireReaction {
    content: String,
    #[serde(default)]
    user: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ArchivedAtData {
    repository: Option<WireArchivedAt>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireArchivedAt {
    archived_at: Option<DateTime<Utc>>,
}

fn login_or_ghost(user: Option<WireUser>) -> String {
    user.map(|u| u.login)
        .unwrap_or_else(|| GHOST_LOGIN.to_string())
}

impl From<WireIssue> for Issue {
    fn from(wire: WireIssue) -> Self {
        let state = if wire.state.eq_ignore_ascii_case("closed") {
            IssueState::Closed
        } else {
            IssueState::Open
        };

        Issue {
            number: wire.number,
            title: wire.title,
            body: normalize_line_endings(wire.body.as_deref().unwrap_or_default()),
            state,
            state_reason: wire.state_reason,
            author: login_or_ghost(wire.user),
            url: wire.html_url,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
            closed_at: wire.closed_at,
            labels: wire
                .labels
                .into_iter()
                .map(|label| Label {
                    name: label.name,
                    description: label.description,
                })
                .collect(),
            assignees: wire.assignees.into_iter().map(|a| a.login).collect(),
            comment_count: wire.comments,
            reaction_count: reaction_total(wire.reactions),
            reactions: Vec::new(),
        }
    }
}

impl From<WireComment> for Comment {
    fn from(wire: WireComment) -> Self {
        Comment {
            id: wire.id,
            author: login_or_ghost(wire.user),
            body: normalize_line_endings(wire.body.as_deref().unwrap_or_default()),
            created_at: wire.created_at,
            reaction_count: reaction_total(wire.reactions),
            reactions: Vec::new(),
        }
    }
}

impl From<WireReaction> for Reaction {
    fn from(wire: WireReaction) -> Self {
        Reaction {
            content: reaction_emoji(&wire.content),
            user: login_or_ghost(wire.user),
        }
    }
}
