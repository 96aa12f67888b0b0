//! State Management - flat-file persistence for sync records and events
//!
//! This module provides persistent storage for:
//! - Per-repository sync records (last successful sync time, used by `--resume`)
//! - Sync events (one per repository per run: synced, empty or failed)
//!
//! Both live inside the save directory under `.issue-archiver/`, so an
//! archive directory carries its own resume points:
//! - `sync_state.json`: every sync record, rewritten atomically
//! - `events.jsonl`: the event log, one JSON object per line, append-only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, Result};

/// Directory inside the save directory that holds archiver bookkeeping
pub const STATE_DIR: &str = ".issue-archiver";

const RECORDS_FILE: &str = "sync_state.json";
const EVENTS_FILE: &str = "events.jsonl";

/// Event types recorded for every repository a run touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Issues were fetched and written
    Synced,
    /// No issues matched the cutoff
    Empty,
    /// The repository failed and its sync record was left untouched
    Failed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Synced => "synced",
            EventType::Empty => "empty",
            EventType::Failed => "failed",
        }
    }

    /// Get the severity level for this event type
    pub fn severity(&self) -> Severity {
        match self {
            EventType::Synced | EventType::Empty => Severity::Info,
            EventType::Failed => Severity::Error,
        }
    }
}

/// Severity levels for events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

/// Last successful sync of one repository
///
/// Records are keyed by API endpoint, repository and whether closed issues
/// were included, so an open-only run never becomes the resume point of a
/// run that also wants closed issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub api_url: String,
    pub full_name: String,
    pub include_closed: bool,
    pub last_synced_at: DateTime<Utc>,
    pub issues_archived: u64,
    pub updated_at: DateTime<Utc>,
}

impl SyncRecord {
    fn matches(&self, api_url: &str, full_name: &str, include_closed: bool) -> bool {
        self.api_url == api_url
            && self.full_name == full_name
            && self.include_closed == include_closed
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordsFile {
    #[serde(default)]
    records: Vec<SyncRecord>,
}

/// A sync event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub repo_full_name: Option<String>,
    pub event_type: EventType,
    pub severity: Severity,
    pub summary: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// Builder for creating new sync events
#[derive(Debug)]
pub struct SyncEventBuilder {
    repo_full_name: Option<String>,
    event_type: EventType,
    summary: String,
    details: Option<String>,
}

impl SyncEventBuilder {
    pub fn new(event_type: EventType, summary: impl Into<String>) -> Self {
        Self {
            repo_full_name: None,
            event_type,
            summary: summary.into(),
            details: None,
        }
    }

    pub fn repo(mut self, full_name: impl Into<String>) -> Self {
        self.repo_full_name = Some(full_name.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn build(self) -> SyncEvent {
        SyncEvent {
            timestamp: Utc::now(),
            repo_full_name: self.repo_full_name,
            severity: self.event_type.severity(),
            event_type: self.event_type,
            summary: self.summary,
            details: self.details,
        }
    }
}

/// State files of one save directory
///
/// Nothing is cached: every call reads or writes the files, so two stores
/// opened on the same directory always agree.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open the state of a save directory, creating the state directory
    pub fn open_for_save_dir(save_dir: &Path) -> Result<Self> {
        let dir = Self::state_dir(save_dir);
        std::fs::create_dir_all(&dir).map_err(|e| ArchiveError::state(&dir, e))?;

        info!("State directory opened at {}", dir.display());
        Ok(Self { dir })
    }

    /// Location of the state directory inside a save directory
    pub fn state_dir(save_dir: &Path) -> PathBuf {
        save_dir.join(STATE_DIR)
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    pub fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    // =========================================================================
    // Sync Record Operations
    // =========================================================================

    /// Last successful sync of a repository, or `None` if it was never synced
    /// with this closed-issue setting
    pub fn last_synced(
        &self,
        api_url: &str,
        full_name: &str,
        include_closed: bool,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .load_records()?
            .records
            .into_iter()
            .find(|r| r.matches(api_url, full_name, include_closed))
            .map(|r| r.last_synced_at))
    }

    /// Record a successful sync
    ///
    /// The stored timestamp only ever moves forward: an older `synced_at`
    /// leaves the record as it is. Returns whether the record advanced.
    pub fn record_sync(
        &self,
        api_url: &str,
        full_name: &str,
        include_closed: bool,
        synced_at: DateTime<Utc>,
        issues_archived: u64,
    ) -> Result<bool> {
        let mut file = self.load_records()?;
        let now = Utc::now();

        match file
            .records
            .iter_mut()
            .find(|r| r.matches(api_url, full_name, include_closed))
        {
            Some(existing) if existing.last_synced_at >= synced_at => {
                debug!(
                    "Keeping sync record for {} at {} (run started {})",
                    full_name, existing.last_synced_at, synced_at
                );
                return Ok(false);
            }
            Some(existing) => {
                existing.last_synced_at = synced_at;
                existing.issues_archived = issues_archived;
                existing.updated_at = now;
            }
            None => file.records.push(SyncRecord {
                api_url: api_url.to_string(),
                full_name: full_name.to_string(),
                include_closed,
                last_synced_at: synced_at,
                issues_archived,
                updated_at: now,
            }),
        }

        self.save_records(&file)?;
        debug!("Updated sync record: {} -> {}", full_name, synced_at);
        Ok(true)
    }

    /// All sync records, most recently synced first
    pub fn list_sync_records(&self) -> Result<Vec<SyncRecord>> {
        let mut records = self.load_records()?.records;
        records.sort_by(|a, b| {
            b.last_synced_at
                .cmp(&a.last_synced_at)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });
        Ok(records)
    }

    fn load_records(&self) -> Result<RecordsFile> {
        let path = self.records_path();
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| ArchiveError::state(&path, e))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RecordsFile::default()),
            Err(e) => Err(ArchiveError::state(&path, e)),
        }
    }

    /// Replace the records file through a temporary file and rename
    fn save_records(&self, file: &RecordsFile) -> Result<()> {
        let path = self.records_path();
        let tmp = self.dir.join(format!("{}.tmp", RECORDS_FILE));

        let mut json =
            serde_json::to_string_pretty(file).map_err(|e| ArchiveError::state(&path, e))?;
        json.push('\n');

        std::fs::write(&tmp, json).map_err(|e| ArchiveError::state(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| ArchiveError::state(&path, e))?;
        Ok(())
    }

    // =========================================================================
    // Event Operations
    // =========================================================================

    /// Append a sync event to the log
    pub fn record_event(&self, builder: SyncEventBuilder) -> Result<SyncEvent> {
        let event = builder.build();
        let path = self.events_path();

        let mut line = serde_json::to_string(&event).map_err(|e| ArchiveError::state(&path, e))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ArchiveError::state(&path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| ArchiveError::state(&path, e))?;

        debug!(
            "Recorded event: {} - {}",
            event.event_type.as_str(),
            event.summary
        );
        Ok(event)
    }

    /// Most recent events, newest first
    pub fn recent_events(&self, limit: u32) -> Result<Vec<SyncEvent>> {
        let path = self.events_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArchiveError::state(&path, e)),
        };

        let events = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<SyncEvent>(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Skipping unreadable event in {}: {}", path.display(), e);
                    None
                }
            })
            .collect::<Vec<_>>();

        Ok(events.into_iter().rev().take(limit as usize).collect())
    }
}
