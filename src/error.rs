//! Error taxonomy for archive runs
//!
//! Every failure is classified by how far it reaches: configuration,
//! credential and state-file problems abort the whole run, everything
//! else is scoped to the repository being synced.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Bad flag combination or malformed input, reported before any network call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The credential was rejected by the API
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Organization or repository missing, or inaccessible with this credential
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure, rate limiting or a server-side error
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The resume state under `.issue-archiver/` could not be read or written
    #[error("State file error for {path}: {message}")]
    State { path: PathBuf, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ArchiveError {
    /// Whether this error must abort the whole run rather than a single repository
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ArchiveError::Configuration(_) | ArchiveError::Auth(_) | ArchiveError::State { .. }
        )
    }

    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArchiveError::FileOperation {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn state(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        ArchiveError::State {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ArchiveError::Configuration("both --org and --repo".into()).is_fatal());
        assert!(ArchiveError::Auth("Bad credentials".into()).is_fatal());
        assert!(ArchiveError::state("/tmp/.issue-archiver/sync_state.json", "EOF").is_fatal());

        assert!(!ArchiveError::NotFound("acme/gone".into()).is_fatal());
        assert!(!ArchiveError::Transient("rate limited".into()).is_fatal());
        assert!(!ArchiveError::file("/tmp/x.md", std::io::Error::other("disk full")).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = ArchiveError::NotFound("organization acme".into());
        assert_eq!(err.to_string(), "Not found: organization acme");

        let err = ArchiveError::file("/tmp/out/1.md", std::io::Error::other("denied"));
        assert!(err.to_string().contains("/tmp/out/1.md"));
    }
}
