//! Markdown and JSON rendering of archived issues
//!
//! Rendering is pure: the same issue and comments always produce the same
//! bytes, which is what lets re-runs leave unchanged files untouched.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{ArchivedIssue, Comment, Issue, IssueState, Reaction, RepoSpec};

/// Both documents for one issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedIssue {
    pub markdown: String,
    pub json: String,
}

pub fn render(repo: &RepoSpec, issue: &Issue, comments: &[Comment]) -> Result<RenderedIssue> {
    Ok(RenderedIssue {
        markdown: render_markdown(repo, issue, comments),
        json: render_json(repo, issue, comments)?,
    })
}

pub fn render_json(repo: &RepoSpec, issue: &Issue, comments: &[Comment]) -> Result<String> {
    let document = ArchivedIssue {
        repository: repo.clone(),
        issue: issue.clone(),
        comments: comments.to_vec(),
    };
    let mut json = serde_json::to_string_pretty(&document)?;
    json.push('\n');
    Ok(json)
}

pub fn render_markdown(repo: &RepoSpec, issue: &Issue, comments: &[Comment]) -> String {
    let mut out: Vec<String> = Vec::new();

    out.push(format!("# {}", issue.title));
    out.push(format!("[{}#{}]({})", repo, issue.number, issue.url));

    if repo.is_archived {
        out.push(match &repo.archived_at {
            Some(archived_at) => {
                format!("> Repository was archived at {}.", timestamp(archived_at))
            }
            None => "> Repository is archived.".to_string(),
        });
    }

    let mut meta = Vec::new();
    meta.push(format!("- **State:** {}", state_line(issue)));
    meta.push(format!("- **Author:** {}", issue.author));
    meta.push(format!("- **Created:** {}", timestamp(&issue.created_at)));
    meta.push(format!("- **Updated:** {}", timestamp(&issue.updated_at)));
    if !issue.assignees.is_empty() {
        meta.push(format!("- **Assignees:** {}", issue.assignees.join(", ")));
    }
    if !issue.labels.is_empty() {
        let labels: Vec<String> = issue.labels.iter().map(ToString::to_string).collect();
        meta.push(format!("- **Labels:** {}", labels.join(", ")));
    }
    if let Some(reactions) = reaction_summary(&issue.reactions) {
        meta.push(format!("- **Reactions:** {}", reactions));
    }
    out.push(meta.join("\n"));

    out.push("---".to_string());
    if !issue.body.trim().is_empty() {
        out.push(issue.body.trim_end().to_string());
    }
    out.push("---".to_string());

    if !comments.is_empty() {
        out.push("## Comments".to_string());
        for comment in comments {
            out.push(format!(
                "### {} (on {})",
                comment.author,
                timestamp(&comment.created_at)
            ));
            if !comment.body.trim().is_empty() {
                out.push(comment.body.trim_end().to_string());
            }
            if let Some(reactions) = reaction_summary(&comment.reactions) {
                out.push(format!("**Reactions:** {}", reactions));
            }
            out.push("---".to_string());
        }
    }

    let mut markdown = out.join("\n\n");
    markdown.push('\n');
    markdown
}

fn state_line(issue: &Issue) -> String {
    match issue.state {
        IssueState::Open => "open".to_string(),
        IssueState::Closed => {
            let mut details = Vec::new();
            if let Some(reason) = issue.state_reason.as_deref().filter(|r| !r.is_empty()) {
                details.push(reason.to_string());
            }
            if let Some(closed_at) = &issue.closed_at {
                details.push(format!("closed at {}", timestamp(closed_at)));
            }
            if details.is_empty() {
                "closed".to_string()
            } else {
                format!("closed ({})", details.join(", "))
            }
        }
    }
}

/// Group reactions by emoji in first-seen order, e.g. `👍 (alice, bob), 🎉 (carol)`
fn reaction_summary(reactions: &[Reaction]) -> Option<String> {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for reaction in reactions {
        let (emoji, user) = (reaction.content.as_str(), reaction.user.as_str());
        match groups.iter_mut().find(|(seen, _)| *seen == emoji) {
            Some((_, users)) => users.push(user),
            None => groups.push((emoji, vec![user])),
        }
    }

    if groups.is_empty() {
        return None;
    }
    let parts: Vec<String> = groups
        .iter()
        .map(|(emoji, users)| format!("{} ({})", emoji, users.join(", ")))
        .collect();
    Some(parts.join(", "))
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
