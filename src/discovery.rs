//! Repository discovery
//!
//! Turns the user's selection (an organization, or an explicit list of
//! `owner/name` repositories) into the ordered, duplicate-free list of
//! repositories a run will archive. Archived repositories that survive the
//! filter also get their archive date looked up.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::error::{ArchiveError, Result};
use crate::models::RepoSpec;
use crate::source::IssueSource;

/// What the user asked to archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSelection {
    /// Every repository of an organization (or user account)
    Organization(String),
    /// An explicit list of repositories, in the order given
    Repositories(Vec<RepoSpec>),
}

impl RepoSelection {
    /// Build a selection from the `--org` / `--repo` flags
    ///
    /// Exactly one of the two must be supplied, and every repository must
    /// be written as `owner/name`.
    pub fn from_args(org: Option<&str>, repos: &[String]) -> Result<Self> {
        let org = org.map(str::trim).filter(|o| !o.is_empty());

        match (org, repos.is_empty()) {
            (Some(_), false) => Err(ArchiveError::Configuration(
                "Cannot specify both --org and --repo, choose one".to_string(),
            )),
            (None, true) => Err(ArchiveError::Configuration(
                "Specify either --org or at least one --repo".to_string(),
            )),
            (Some(org), true) => Ok(RepoSelection::Organization(org.to_string())),
            (None, false) => {
                let specs = repos
                    .iter()
                    .map(|r| parse_repo_slug(r))
                    .collect::<Result<Vec<_>>>()?;
                Ok(RepoSelection::Repositories(specs))
            }
        }
    }
}

/// Parse an `owner/name` slug
pub fn parse_repo_slug(slug: &str) -> Result<RepoSpec> {
    static SLUG: OnceLock<Regex> = OnceLock::new();
    let re = SLUG.get_or_init(|| {
        Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)/([A-Za-z0-9._-]+)$")
            .expect("repository slug pattern is valid")
    });

    let slug = slug.trim();
    let caps = re.captures(slug).ok_or_else(|| {
        ArchiveError::Configuration(format!(
            "Repository '{}' should be specified as owner/name",
            slug
        ))
    })?;

    let name = &caps[2];
    if name == "." || name == ".." {
        return Err(ArchiveError::Configuration(format!(
            "Repository '{}' has an invalid name",
            slug
        )));
    }

    Ok(RepoSpec::new(&caps[1], name))
}

/// Resolve a selection into the repositories to archive
pub async fn discover(
    source: &dyn IssueSource,
    selection: &RepoSelection,
    include_archived: bool,
) -> Result<Vec<RepoSpec>> {
    let candidates = match selection {
        RepoSelection::Organization(org) => {
            let mut repos = source.list_org_repositories(org).await?;
            repos.sort_by(|a, b| a.full_name().cmp(&b.full_name()));
            repos
        }
        RepoSelection::Repositories(requested) => {
            let mut repos = Vec::with_capacity(requested.len());
            for spec in requested {
                repos.push(lookup_repository(source, spec).await?);
            }
            repos
        }
    };

    let total = candidates.len();
    let mut seen = HashSet::new();
    let mut repos: Vec<RepoSpec> = candidates
        .into_iter()
        .filter(|repo| seen.insert(repo.full_name().to_lowercase()))
        .filter(|repo| {
            if repo.is_archived && !include_archived {
                debug!("Excluding archived repository: {}", repo);
                false
            } else {
                true
            }
        })
        .collect();

    for repo in repos
        .iter_mut()
        .filter(|r| r.is_archived && r.archived_at.is_none())
    {
        match source.archived_at(repo).await {
            Ok(archived_at) => repo.archived_at = archived_at,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!("Could not learn when {} was archived: {}", repo, e),
        }
    }

    info!(
        "Selected {} of {} repositories from {}",
        repos.len(),
        total,
        source.provider_name()
    );
    Ok(repos)
}

/// Learn an explicitly requested repository's archived flag
///
/// A repository that cannot be looked up stays in the list; its fetch
/// will fail and be reported for that repository alone.
async fn lookup_repository(source: &dyn IssueSource, spec: &RepoSpec) -> Result<RepoSpec> {
    match source.get_repository(&spec.owner, &spec.name).await {
        Ok(found) => Ok(found),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!("Could not look up {}: {}", spec, e);
            Ok(spec.clone())
        }
    }
}
