//! On-disk layout of archived issues
//!
//! Every issue maps to `<root>/<owner>/<repo>/<number>.<ext>`. The path
//! depends only on the issue number, so re-running a sync overwrites the
//! previous snapshot instead of adding a second one.

use chrono::{DateTime, Utc};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::models::{FileFormat, RepoSpec};
use crate::render::RenderedIssue;

/// What happened to a single output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Per-issue tally of written files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub unchanged: usize,
}

impl WriteStats {
    fn count(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Created | WriteOutcome::Updated => self.written += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub fn add(&mut self, other: WriteStats) {
        self.written += other.written;
        self.unchanged += other.unchanged;
    }
}

/// Writes rendered issues under a save directory
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    root: PathBuf,
    formats: Vec<FileFormat>,
    preserve_timestamps: bool,
}

impl ArchiveWriter {
    pub fn new(root: impl Into<PathBuf>, formats: &[FileFormat], preserve_timestamps: bool) -> Self {
        let mut unique = Vec::new();
        for format in formats {
            if !unique.contains(format) {
                unique.push(*format);
            }
        }

        Self {
            root: root.into(),
            formats: unique,
            preserve_timestamps,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn formats(&self) -> &[FileFormat] {
        &self.formats
    }

    /// Directory holding one repository's issues
    pub fn repo_dir(&self, repo: &RepoSpec) -> PathBuf {
        self.root.join(&repo.owner).join(&repo.name)
    }

    pub fn document_path(&self, repo: &RepoSpec, number: u64, format: FileFormat) -> PathBuf {
        self.repo_dir(repo)
            .join(format!("{}.{}", number, format.extension()))
    }

    /// Write the selected formats of one issue
    pub fn write_issue(
        &self,
        repo: &RepoSpec,
        number: u64,
        updated_at: DateTime<Utc>,
        rendered: &RenderedIssue,
    ) -> Result<WriteStats> {
        let dir = self.repo_dir(repo);
        std::fs::create_dir_all(&dir).map_err(|e| ArchiveError::file(&dir, e))?;

        let mut stats = WriteStats::default();
        for format in &self.formats {
            let contents = match format {
                FileFormat::Md => &rendered.markdown,
                FileFormat::Json => &rendered.json,
            };
            let path = self.document_path(repo, number, *format);
            let outcome = write_if_changed(&path, contents.as_bytes())?;

            if self.preserve_timestamps && outcome != WriteOutcome::Unchanged {
                let mtime = FileTime::from_unix_time(
                    updated_at.timestamp(),
                    updated_at.timestamp_subsec_nanos(),
                );
                filetime::set_file_mtime(&path, mtime).map_err(|e| ArchiveError::file(&path, e))?;
            }

            debug!("{:?} {}", outcome, path.display());
            stats.count(outcome);
        }

        Ok(stats)
    }
}

/// Write `contents` unless the file already holds exactly these bytes
pub fn write_if_changed(path: &Path, contents: &[u8]) -> Result<WriteOutcome> {
    let outcome = match std::fs::read(path) {
        Ok(existing) if existing == contents => return Ok(WriteOutcome::Unchanged),
        Ok(_) => WriteOutcome::Updated,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => WriteOutcome::Created,
        Err(e) => return Err(ArchiveError::file(path, e)),
    };

    std::fs::write(path, contents).map_err(|e| ArchiveError::file(path, e))?;
    Ok(outcome)
}
