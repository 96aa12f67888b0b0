//! Issue fetching with early pagination stop
//!
//! [`IssuePager`] walks a repository's issues page by page, most recently
//! updated first, and yields each issue together with its comments and
//! reactions. Because the listing is sorted by `updated_at` descending, the
//! first issue older than the cutoff means every later page is older too,
//! so the pager stops there instead of scanning the whole repository.
//!
//! A pager is finite and single-use: it cannot be resumed part way through.
//! Starting over means constructing a new one.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{FetchedIssue, Issue, IssueState, RepoSpec};
use crate::source::{IssueQuery, IssueSource};

pub struct IssuePager<'a> {
    source: &'a dyn IssueSource,
    repo: &'a RepoSpec,
    query: IssueQuery,
    next_page: u32,
    buffer: VecDeque<Issue>,
    exhausted: bool,
    /// `updated_at` of the last issue seen, for the ordering check
    last_updated: Option<DateTime<Utc>>,
    /// Cleared once the source returns issues out of order
    ordered: bool,
    stopped_early: bool,
}

impl<'a> IssuePager<'a> {
    pub fn new(source: &'a dyn IssueSource, repo: &'a RepoSpec, query: IssueQuery) -> Self {
        Self {
            source,
            repo,
            query,
            next_page: 1,
            buffer: VecDeque::new(),
            exhausted: false,
            last_updated: None,
            ordered: true,
            stopped_early: false,
        }
    }

    /// Yield the next issue with its comments, or `None` once the sequence ends
    pub async fn next(&mut self) -> Result<Option<FetchedIssue>> {
        self.fill().await?;

        let Some(mut issue) = self.buffer.pop_front() else {
            return Ok(None);
        };

        let mut comments = if issue.comment_count == 0 {
            Vec::new()
        } else {
            self.source.list_comments(self.repo, issue.number).await?
        };

        if issue.reaction_count > 0 {
            issue.reactions = self
                .source
                .list_issue_reactions(self.repo, issue.number)
                .await?;
        }
        for comment in comments.iter_mut().filter(|c| c.reaction_count > 0) {
            comment.reactions = self
                .source
                .list_comment_reactions(self.repo, comment.id)
                .await?;
        }

        Ok(Some(FetchedIssue { issue, comments }))
    }

    /// Number of listing pages requested so far
    pub fn pages_fetched(&self) -> u32 {
        self.next_page - 1
    }

    /// Whether pagination ended at the cutoff rather than at the last page
    pub fn stopped_early(&self) -> bool {
        self.stopped_early
    }

    async fn fill(&mut self) -> Result<()> {
        while self.buffer.is_empty() && !self.exhausted {
            let page_number = self.next_page;
            let page = self
                .source
                .list_issues_page(self.repo, &self.query, page_number)
                .await?;
            self.next_page += 1;

            if page.issues.is_empty() && page.is_last {
                self.exhausted = true;
                break;
            }

            let mut reached_cutoff = false;
            for issue in page.issues {
                self.check_order(&issue);

                if let Some(since) = self.query.since {
                    if issue.updated_at < since {
                        reached_cutoff = true;
                        continue;
                    }
                }
                if !self.query.include_closed && issue.state == IssueState::Closed {
                    continue;
                }
                self.buffer.push_back(issue);
            }

            if reached_cutoff && self.ordered {
                debug!(
                    "Reached cutoff on page {} of {}, stopping pagination",
                    page_number, self.repo
                );
                self.stopped_early = true;
                self.exhausted = true;
            } else if page.is_last {
                self.exhausted = true;
            }
        }

        Ok(())
    }

    fn check_order(&mut self, issue: &Issue) {
        if let Some(previous) = self.last_updated {
            if self.ordered && issue.updated_at > previous {
                warn!(
                    "{} returned issues of {} out of updated-descending order (#{}); \
                     scanning every page instead of stopping at the cutoff",
                    self.source.provider_name(),
                    self.repo,
                    issue.number
                );
                self.ordered = false;
            }
        }
        self.last_updated = Some(issue.updated_at);
    }
}
