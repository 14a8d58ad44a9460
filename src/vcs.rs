//! Repository coordinates of module paths and git remotes.

use std::path::Path;

use git2::Repository;
use tracing::debug;

/// Remote consulted first when reading a repository's URL.
const PRIMARY_REMOTE: &str = "origin";

/// `host/owner/repo` parts of a module path or remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub host: String,
    pub owner: String,
    pub repository: String,
}

/// Parses `host/owner/repo[/...]`, `https://host/owner/repo[.git]` and
/// `git@host:owner/repo[.git]`. Returns `None` with fewer than three parts.
pub fn parse_repo_url(url: &str) -> Option<RepoCoordinates> {
    let url = url.trim();
    let url = if let Some(rest) = url.strip_prefix("https://").or_else(|| url.strip_prefix("http://")) {
        rest.to_string()
    } else if let Some(rest) = url.strip_prefix("ssh://") {
        rest.strip_prefix("git@").unwrap_or(rest).to_string()
    } else if let Some(rest) = url.strip_prefix("git@") {
        rest.replacen(':', "/", 1)
    } else {
        url.to_string()
    };
    let url = url.strip_suffix(".git").unwrap_or(&url);

    let mut parts = url.split('/');
    let (host, owner, repository) = (parts.next()?, parts.next()?, parts.next()?);
    if host.is_empty() || owner.is_empty() || repository.is_empty() {
        return None;
    }

    Some(RepoCoordinates {
        host: host.to_string(),
        owner: owner.to_string(),
        repository: repository.to_string(),
    })
}

/// True when `module` lives under `owner` on its host.
pub fn is_internal(module: &str, owner: &str) -> bool {
    !owner.is_empty() && parse_repo_url(module).is_some_and(|c| c.owner == owner)
}

/// URL of the `origin` remote of the repository containing `folder`, or of
/// its first remote when there is no `origin`.
///
/// The repository is discovered upwards from `folder`, so module
/// subdirectories, worktrees and submodule checkouts all resolve.
pub fn remote_url(folder: &Path) -> Option<String> {
    let repo = match Repository::discover(folder) {
        Ok(repo) => repo,
        Err(e) => {
            debug!(folder = %folder.display(), error = %e, "no git repository");
            return None;
        }
    };

    let remote = match repo.find_remote(PRIMARY_REMOTE) {
        Ok(remote) => remote,
        Err(_) => {
            let names = repo.remotes().ok()?;
            let first = names.iter().flatten().next()?;
            debug!(remote = first, "no origin remote; using first remote");
            repo.find_remote(first).ok()?
        }
    };
    remote.url().map(str::to_string)
}

/// Owner of the repository checked out at `folder`, if it has a remote.
pub fn detect_owner(folder: &Path) -> Option<String> {
    let url = remote_url(folder)?;
    parse_repo_url(&url).map(|c| c.owner)
}
