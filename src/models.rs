//! Source-independent records for repositories, issues and comments
//!
//! These are what the fetcher yields and what the renderer consumes. The
//! GitHub wire format is translated into them inside [`crate::github`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A repository selected for archival
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSpec {
    /// Owner/organization name (e.g., "acme")
    pub owner: String,

    /// Repository name (e.g., "widgets")
    pub name: String,

    /// Whether the hosting service marks the repository as archived
    #[serde(default)]
    pub is_archived: bool,

    /// When the repository was archived, if the host reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

impl RepoSpec {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            is_archived: false,
            archived_at: None,
        }
    }

    pub fn archived(mut self, is_archived: bool) -> Self {
        self.is_archived = is_archived;
        self
    }

    /// Get display name (owner/name format)
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => write!(f, "{} ({})", self.name, description),
            None => f.write_str(&self.name),
        }
    }
}

/// A reaction left on an issue or comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// The reaction as an emoji, e.g. "👍"
    pub content: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique within its repository
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: IssueState,
    /// e.g. "completed" or "not_planned" for closed issues
    #[serde(default)]
    pub state_reason: Option<String>,
    pub author: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub assignees: Vec<String>,
    /// Comment count reported by the source; zero means comments are not requested
    #[serde(default)]
    pub comment_count: u32,
    /// Reaction count reported by the source; zero means reactions are not requested
    #[serde(default)]
    pub reaction_count: u32,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reaction_count: u32,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

/// An issue together with its comments, as yielded by the fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedIssue {
    pub issue: Issue,
    pub comments: Vec<Comment>,
}

/// The JSON document written for every issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedIssue {
    pub repository: RepoSpec,
    #[serde(flatten)]
    pub issue: Issue,
    pub comments: Vec<Comment>,
}

/// Output formats selectable with `--formats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    #[value(name = "MD", alias = "md")]
    Md,
    #[value(name = "JSON", alias = "json")]
    Json,
}

impl FileFormat {
    pub fn all() -> Vec<FileFormat> {
        vec![FileFormat::Md, FileFormat::Json]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Md => "md",
            FileFormat::Json => "json",
        }
    }
}

/// Normalize Windows line endings so rendered output is stable across sources
pub(crate) fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}
