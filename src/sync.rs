//! Sync Engine - Orchestrates issue archival across repositories
//!
//! Repositories are processed one at a time. Each one moves through
//! `Pending -> Fetching -> Writing -> Done`, or ends in `Failed`. A failure
//! scoped to one repository is logged and recorded, and the run moves on;
//! only fatal errors (credentials, state files) abort the batch.
//!
//! A repository's sync record is written only after all of its issues have
//! been fetched and written, so an interrupted or failed repository keeps
//! its previous resume point.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveWriter, WriteStats};
use crate::error::Result;
use crate::fetcher::IssuePager;
use crate::models::RepoSpec;
use crate::render::render;
use crate::source::{IssueQuery, IssueSource};
use crate::state::{EventType, StateStore, SyncEventBuilder};

/// Per-run options that shape what gets fetched
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Explicit cutoff date; takes precedence over `resume`
    pub since_date: Option<NaiveDate>,
    /// Use each repository's last successful sync as its cutoff
    pub resume: bool,
    pub include_closed: bool,
}

/// Where a repository's cutoff came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutoffSource {
    Explicit,
    Resumed,
    FullHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutoff {
    pub since: Option<DateTime<Utc>>,
    pub source: CutoffSource,
}

/// Lifecycle of one repository within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoPhase {
    Pending,
    Fetching,
    Writing,
    Done,
    Failed,
}

/// Result of syncing one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    /// Issues were fetched and written
    Synced {
        issues: usize,
        files_written: usize,
        files_unchanged: usize,
    },
    /// Nothing matched the cutoff
    Empty,
    /// The repository failed; its sync record was left untouched
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct RepoReport {
    pub repo: RepoSpec,
    pub cutoff: Cutoff,
    pub outcome: RepoOutcome,
}

impl RepoReport {
    pub fn phase(&self) -> RepoPhase {
        match self.outcome {
            RepoOutcome::Failed { .. } => RepoPhase::Failed,
            _ => RepoPhase::Done,
        }
    }
}

/// Results from a complete sync operation
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Repositories that synced without any matching issue
    pub skipped: usize,
    pub issues_archived: usize,
    pub files_written: usize,
    pub files_unchanged: usize,
    pub duration: Duration,
    pub reports: Vec<RepoReport>,
}

impl SyncSummary {
    pub fn from_reports(reports: Vec<RepoReport>, duration: Duration) -> Self {
        let mut summary = SyncSummary {
            total_repositories: reports.len(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            issues_archived: 0,
            files_written: 0,
            files_unchanged: 0,
            duration,
            reports: Vec::new(),
        };

        for report in &reports {
            match &report.outcome {
                RepoOutcome::Synced {
                    issues,
                    files_written,
                    files_unchanged,
                } => {
                    summary.succeeded += 1;
                    summary.issues_archived += issues;
                    summary.files_written += files_written;
                    summary.files_unchanged += files_unchanged;
                }
                RepoOutcome::Empty => summary.skipped += 1,
                RepoOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        summary.reports = reports;
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (&RepoSpec, &str)> {
        self.reports.iter().filter_map(|report| match &report.outcome {
            RepoOutcome::Failed { error } => Some((&report.repo, error.as_str())),
            _ => None,
        })
    }

    pub fn report_for(&self, full_name: &str) -> Option<&RepoReport> {
        self.reports
            .iter()
            .find(|report| report.repo.full_name() == full_name)
    }
}

#[derive(Debug, Default)]
struct RepoTally {
    issues: usize,
    files: WriteStats,
}

/// The sync engine that drives fetching, rendering and writing
pub struct SyncEngine {
    source: Arc<dyn IssueSource>,
    state: StateStore,
    writer: ArchiveWriter,
    options: SyncOptions,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn IssueSource>,
        state: StateStore,
        writer: ArchiveWriter,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            state,
            writer,
            options,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn writer(&self) -> &ArchiveWriter {
        &self.writer
    }

    /// Decide the cutoff for a repository
    ///
    /// An explicit date wins; otherwise `resume` uses the stored sync
    /// record; otherwise the full history is fetched.
    pub fn effective_cutoff(&self, repo: &RepoSpec) -> Result<Cutoff> {
        if let Some(date) = self.options.since_date {
            let since = date
                .and_hms_opt(0, 0, 0)
                .map(|midnight| Utc.from_utc_datetime(&midnight));
            return Ok(Cutoff {
                since,
                source: CutoffSource::Explicit,
            });
        }

        if self.options.resume {
            match self
                .state
                .last_synced(
                    self.source.api_url(),
                    &repo.full_name(),
                    self.options.include_closed,
                )?
            {
                Some(last) => {
                    return Ok(Cutoff {
                        since: Some(last),
                        source: CutoffSource::Resumed,
                    })
                }
                None => info!("No previous sync of {}, fetching full history", repo),
            }
        }

        Ok(Cutoff {
            since: None,
            source: CutoffSource::FullHistory,
        })
    }

    /// Archive every repository in order, isolating per-repository failures
    pub async fn run(&self, repos: &[RepoSpec]) -> Result<SyncSummary> {
        let start_time = Instant::now();
        let mut reports = Vec::with_capacity(repos.len());

        info!("Starting issue archival for {} repositories", repos.len());

        for repo in repos {
            debug!("{}: {:?}", repo, RepoPhase::Pending);

            let cutoff = self.effective_cutoff(repo)?;
            let started_at = Utc::now();

            let outcome = match self.sync_repository(repo, &cutoff).await {
                Ok(tally) => self.complete_repository(repo, started_at, tally)?,
                Err(e) if e.is_fatal() => {
                    error!("Aborting run while syncing {}: {}", repo, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("{}: {:?}: {}", repo, RepoPhase::Failed, e);
                    self.state.record_event(
                        SyncEventBuilder::new(EventType::Failed, "Sync failed")
                            .repo(repo.full_name())
                            .details(e.to_string()),
                    )?;
                    RepoOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };

            reports.push(RepoReport {
                repo: repo.clone(),
                cutoff,
                outcome,
            });
        }

        let summary = SyncSummary::from_reports(reports, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} succeeded, {} failed, {} skipped",
            summary.duration.as_secs_f64(),
            summary.succeeded,
            summary.failed,
            summary.skipped
        );

        Ok(summary)
    }

    async fn sync_repository(&self, repo: &RepoSpec, cutoff: &Cutoff) -> Result<RepoTally> {
        debug!(
            "{}: {:?} (cutoff {:?} from {:?})",
            repo,
            RepoPhase::Fetching,
            cutoff.since,
            cutoff.source
        );

        let query = IssueQuery::new(cutoff.since, self.options.include_closed);
        let mut pager = IssuePager::new(self.source.as_ref(), repo, query);
        let mut tally = RepoTally::default();

        while let Some(fetched) = pager.next().await? {
            debug!(
                "{}: {:?} #{}",
                repo,
                RepoPhase::Writing,
                fetched.issue.number
            );

            let rendered = render(repo, &fetched.issue, &fetched.comments)?;
            let stats = self.writer.write_issue(
                repo,
                fetched.issue.number,
                fetched.issue.updated_at,
                &rendered,
            )?;

            tally.issues += 1;
            tally.files.add(stats);
        }

        debug!(
            "{}: fetched {} pages{}",
            repo,
            pager.pages_fetched(),
            if pager.stopped_early() {
                " (stopped at cutoff)"
            } else {
                ""
            }
        );

        Ok(tally)
    }

    /// Record a fully written repository and build its outcome
    fn complete_repository(
        &self,
        repo: &RepoSpec,
        started_at: DateTime<Utc>,
        tally: RepoTally,
    ) -> Result<RepoOutcome> {
        self.state.record_sync(
            self.source.api_url(),
            &repo.full_name(),
            self.options.include_closed,
            started_at,
            tally.issues as u64,
        )?;

        let outcome = if tally.issues == 0 {
            self.state.record_event(
                SyncEventBuilder::new(EventType::Empty, "No issues matched the cutoff")
                    .repo(repo.full_name()),
            )?;
            RepoOutcome::Empty
        } else {
            self.state.record_event(
                SyncEventBuilder::new(
                    EventType::Synced,
                    format!("Archived {} issues", tally.issues),
                )
                .repo(repo.full_name())
                .details(format!(
                    "{} files written, {} unchanged",
                    tally.files.written, tally.files.unchanged
                )),
            )?;
            RepoOutcome::Synced {
                issues: tally.issues,
                files_written: tally.files.written,
                files_unchanged: tally.files.unchanged,
            }
        };

        info!("{}: {:?} ({} issues)", repo, RepoPhase::Done, tally.issues);
        Ok(outcome)
    }
}
