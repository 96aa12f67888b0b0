//! Common test utilities and helpers for issue-archiver tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use issue_archiver::{
    ArchiveError, Comment, Issue, IssuePage, IssueQuery, IssueSource, IssueState, Label, Reaction,
    RepoSpec, Result,
};

pub const FAKE_API_URL: &str = "https://fake.example.com/api/";

/// Parse an RFC3339 timestamp in test fixtures
pub fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("valid RFC3339 timestamp in fixture")
}

/// An open issue created a week before its last update
pub fn issue(number: u64, updated_at: &str) -> Issue {
    let updated_at = ts(updated_at);
    Issue {
        number,
        title: format!("Issue {}", number),
        body: format!("Body of issue {}", number),
        state: IssueState::Open,
        state_reason: None,
        author: "octocat".to_string(),
        url: format!("https://github.com/acme/widgets/issues/{}", number),
        created_at: updated_at - chrono::Duration::days(7),
        updated_at,
        closed_at: None,
        labels: vec![Label {
            name: "bug".to_string(),
            description: None,
        }],
        assignees: Vec::new(),
        comment_count: 0,
        reaction_count: 0,
        reactions: Vec::new(),
    }
}

pub fn closed_issue(number: u64, updated_at: &str) -> Issue {
    let mut issue = issue(number, updated_at);
    issue.state = IssueState::Closed;
    issue.state_reason = Some("completed".to_string());
    issue.closed_at = Some(issue.updated_at);
    issue
}

pub fn comment(id: u64, author: &str, body: &str, created_at: &str) -> Comment {
    Comment {
        id,
        author: author.to_string(),
        body: body.to_string(),
        created_at: ts(created_at),
        reaction_count: 0,
        reactions: Vec::new(),
    }
}

pub fn reaction(content: &str, user: &str) -> Reaction {
    Reaction {
        content: content.to_string(),
        user: user.to_string(),
    }
}

/// Error kinds a [`FakeSource`] can be told to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transient,
    Auth,
    NotFound,
}

impl Failure {
    fn to_error(self, what: &str) -> ArchiveError {
        match self {
            Failure::Transient => ArchiveError::Transient(format!("HTTP 502 for {}", what)),
            Failure::Auth => ArchiveError::Auth("Bad credentials".to_string()),
            Failure::NotFound => ArchiveError::NotFound(what.to_string()),
        }
    }
}

/// In-memory issue source
///
/// Issues are served in the order they were added, so fixtures list them
/// most recently updated first unless a test wants an out-of-order source.
pub struct FakeSource {
    orgs: HashMap<String, Vec<RepoSpec>>,
    repos: HashMap<String, RepoSpec>,
    issues: HashMap<String, Vec<Issue>>,
    comments: HashMap<(String, u64), Vec<Comment>>,
    issue_reactions: HashMap<(String, u64), Vec<Reaction>>,
    comment_reactions: HashMap<(String, u64), Vec<Reaction>>,
    archive_dates: HashMap<String, DateTime<Utc>>,
    issue_failures: HashMap<String, Failure>,
    lookup_failures: HashMap<String, Failure>,
    archive_date_failures: HashMap<String, Failure>,
    page_size: usize,
    honor_since: bool,
    honor_state: bool,
    requests: Mutex<Vec<String>>,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            orgs: HashMap::new(),
            repos: HashMap::new(),
            issues: HashMap::new(),
            comments: HashMap::new(),
            issue_reactions: HashMap::new(),
            comment_reactions: HashMap::new(),
            archive_dates: HashMap::new(),
            issue_failures: HashMap::new(),
            lookup_failures: HashMap::new(),
            archive_date_failures: HashMap::new(),
            page_size: 100,
            honor_since: true,
            honor_state: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Register a repository with its issues
    pub fn with_repo(mut self, repo: RepoSpec, issues: Vec<Issue>) -> Self {
        let key = repo.full_name();
        self.orgs
            .entry(repo.owner.clone())
            .or_default()
            .push(repo.clone());
        self.repos.insert(key.to_lowercase(), repo);
        self.issues.insert(key, issues);
        self
    }

    pub fn with_comments(mut self, repo: &str, number: u64, comments: Vec<Comment>) -> Self {
        self.comments.insert((repo.to_string(), number), comments);
        self
    }

    /// Attach reactions to an issue and set its reaction count to match
    pub fn with_issue_reactions(
        mut self,
        repo: &str,
        number: u64,
        reactions: Vec<Reaction>,
    ) -> Self {
        if let Some(issue) = self.issue_mut(repo, number) {
            issue.reaction_count = reactions.len() as u32;
        }
        self.issue_reactions.insert((repo.to_string(), number), reactions);
        self
    }

    /// Attach reactions to a comment added earlier with [`FakeSource::with_comments`]
    pub fn with_comment_reactions(
        mut self,
        repo: &str,
        comment_id: u64,
        reactions: Vec<Reaction>,
    ) -> Self {
        let count = reactions.len() as u32;
        for ((name, _), comments) in self.comments.iter_mut() {
            if name == repo {
                for comment in comments.iter_mut().filter(|c| c.id == comment_id) {
                    comment.reaction_count = count;
                }
            }
        }
        self.comment_reactions.insert((repo.to_string(), comment_id), reactions);
        self
    }

    pub fn with_archive_date(mut self, repo: &str, archived_at: &str) -> Self {
        self.archive_dates.insert(repo.to_string(), ts(archived_at));
        self
    }

    fn issue_mut(&mut self, repo: &str, number: u64) -> Option<&mut Issue> {
        self.issues
            .get_mut(repo)
            .and_then(|issues| issues.iter_mut().find(|i| i.number == number))
    }

    /// Register an organization even if it owns no repository
    pub fn with_org(mut self, org: &str) -> Self {
        self.orgs.entry(org.to_string()).or_default();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Ignore `since` like an API that only sorts and leaves filtering to the client
    pub fn ignoring_since(mut self) -> Self {
        self.honor_since = false;
        self
    }

    /// Ignore the state filter and return closed issues even for open-only queries
    pub fn ignoring_state(mut self) -> Self {
        self.honor_state = false;
        self
    }

    pub fn failing_issues(mut self, repo: &str, failure: Failure) -> Self {
        self.issue_failures.insert(repo.to_string(), failure);
        self
    }

    pub fn failing_lookup(mut self, repo: &str, failure: Failure) -> Self {
        self.lookup_failures.insert(repo.to_string(), failure);
        self
    }

    pub fn failing_archive_date(mut self, repo: &str, failure: Failure) -> Self {
        self.archive_date_failures.insert(repo.to_string(), failure);
        self
    }

    /// Every request made so far, e.g. `issues acme/widgets page=2`
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of issue listing pages requested for a repository
    pub fn issue_pages_requested(&self, repo: &str) -> usize {
        let prefix = format!("issues {} ", repo);
        self.requests()
            .iter()
            .filter(|r| r.starts_with(&prefix))
            .count()
    }

    pub fn comment_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.starts_with("comments "))
            .count()
    }

    pub fn reaction_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.starts_with("reactions "))
            .count()
    }

    fn log(&self, request: String) {
        self.requests.lock().unwrap().push(request);
    }
}

#[async_trait]
impl IssueSource for FakeSource {
    async fn list_org_repositories(&self, org: &str) -> Result<Vec<RepoSpec>> {
        self.log(format!("repos {}", org));
        self.orgs
            .get(org)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(format!("organization {}", org)))
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RepoSpec> {
        let full_name = format!("{}/{}", owner, name);
        self.log(format!("repo {}", full_name));

        if let Some(failure) = self.lookup_failures.get(&full_name) {
            return Err(failure.to_error(&full_name));
        }
        self.repos
            .get(&full_name.to_lowercase())
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(full_name))
    }

    async fn list_issues_page(
        &self,
        repo: &RepoSpec,
        query: &IssueQuery,
        page: u32,
    ) -> Result<IssuePage> {
        let full_name = repo.full_name();
        self.log(format!("issues {} page={}", full_name, page));

        if let Some(failure) = self.issue_failures.get(&full_name) {
            return Err(failure.to_error(&full_name));
        }
        let all = self
            .issues
            .get(&full_name)
            .ok_or_else(|| ArchiveError::NotFound(full_name.clone()))?;

        let matching: Vec<&Issue> = all
            .iter()
            .filter(|i| !self.honor_state || query.include_closed || i.state == IssueState::Open)
            .filter(|i| match (self.honor_since, query.since) {
                (true, Some(since)) => i.updated_at >= since,
                _ => true,
            })
            .collect();

        let start = (page.saturating_sub(1) as usize) * self.page_size;
        let end = (start + self.page_size).min(matching.len());
        let issues = if start < matching.len() {
            matching[start..end].iter().map(|i| (*i).clone()).collect()
        } else {
            Vec::new()
        };

        Ok(IssuePage {
            issues,
            is_last: end >= matching.len(),
        })
    }

    async fn list_comments(&self, repo: &RepoSpec, issue_number: u64) -> Result<Vec<Comment>> {
        let full_name = repo.full_name();
        self.log(format!("comments {}#{}", full_name, issue_number));
        Ok(self
            .comments
            .get(&(full_name, issue_number))
            .cloned()
            .unwrap_or_default())
    }

    async fn archived_at(&self, repo: &RepoSpec) -> Result<Option<DateTime<Utc>>> {
        let full_name = repo.full_name();
        self.log(format!("archived_at {}", full_name));

        if let Some(failure) = self.archive_date_failures.get(&full_name) {
            return Err(failure.to_error(&full_name));
        }
        Ok(self.archive_dates.get(&full_name).copied())
    }

    async fn list_issue_reactions(
        &self,
        repo: &RepoSpec,
        issue_number: u64,
    ) -> Result<Vec<Reaction>> {
        let full_name = repo.full_name();
        self.log(format!("reactions {}#{}", full_name, issue_number));
        Ok(self
            .issue_reactions
            .get(&(full_name, issue_number))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_comment_reactions(
        &self,
        repo: &RepoSpec,
        comment_id: u64,
    ) -> Result<Vec<Reaction>> {
        let full_name = repo.full_name();
        self.log(format!("reactions {} comment={}", full_name, comment_id));
        Ok(self
            .comment_reactions
            .get(&(full_name, comment_id))
            .cloned()
            .unwrap_or_default())
    }

    fn api_url(&self) -> &str {
        FAKE_API_URL
    }

    fn provider_name(&self) -> &'static str {
        "Fake"
    }
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}

/// Relative paths of every file under a directory, sorted, ignoring the state directory
pub fn archived_files(root: &std::path::Path) -> Vec<String> {
    fn walk(dir: &std::path::Path, root: &std::path::Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                if path.file_name().and_then(|n| n.to_str()) != Some(".issue-archiver") {
                    walk(&path, root, out);
                }
            } else {
                let relative = path.strip_prefix(root).unwrap();
                out.push(relative.to_string_lossy().replace('\\', "/"));
            }
        }
    }

    let mut files = Vec::new();
    if root.exists() {
        walk(root, root, &mut files);
    }
    files.sort();
    files
}
