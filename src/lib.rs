//! issue-archiver - Archive GitHub issues to local Markdown and JSON files
//!
//! issue-archiver keeps a local copy of a project's issue history, so it
//! survives repository deletion or merging.
//!
//! ## Core Features
//!
//! - **Repository Selection**: a whole organization or an explicit repository list
//! - **Incremental Sync**: date cutoffs and per-repository resume points
//! - **Early Stop**: pagination ends at the first issue older than the cutoff
//! - **Stable Output**: one Markdown and one JSON file per issue, rewritten in place
//! - **Failure Isolation**: one failing repository never aborts the others
//!
//! ## Modules
//!
//! - [`discovery`]: Repository selection and enumeration
//! - [`source`]: Hosting-service abstraction, implemented by [`github`]
//! - [`fetcher`]: Paginated issue fetching with early stop
//! - [`render`]: Markdown and JSON rendering
//! - [`archive`]: On-disk layout of archived issues
//! - [`state`]: JSON sync records and event log under `.issue-archiver/`
//! - [`sync`]: The orchestrator tying it together

pub mod archive;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod github;
pub mod models;
pub mod render;
pub mod source;
pub mod state;
pub mod sync;

pub use archive::ArchiveWriter;
pub use config::Config;
pub use discovery::{discover, RepoSelection};
pub use error::{ArchiveError, Result};
pub use fetcher::IssuePager;
pub use github::GitHubClient;
pub use models::{
    Comment, FetchedIssue, FileFormat, Issue, IssueState, Label, Reaction, RepoSpec,
};
pub use source::{IssuePage, IssueQuery, IssueSource};
pub use state::StateStore;
pub use sync::{SyncEngine, SyncOptions, SyncSummary};
