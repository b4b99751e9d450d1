//! Git integration for deckard.
//!
//! Read-only queries (repository discovery, worktree enumeration, upstream
//! and default-branch lookups) use `git2` and run on the blocking pool,
//! opening a fresh `Repository` per call since it must not be shared across
//! threads. Mutating operations (worktree add/remove, commit, push) shell out
//! to the `git` CLI through the [`CommandRunner`](crate::process::CommandRunner)
//! so they honour the user's hooks, credentials and config.

pub mod ops;
pub mod worktree;

use std::path::{Path, PathBuf};

use git2::{BranchType, Repository};

use crate::error::{CoreError, Result};

pub use ops::GitOps;
pub use worktree::{GitWorktrees, WorktreeSource};

/// Returns the root of the main worktree of the repository containing `start`.
///
/// Running from inside a linked worktree still yields the main worktree, so
/// the dashboard shows the same fleet wherever it is launched.
pub fn discover_root(start: &Path) -> Result<PathBuf> {
    let repo = Repository::discover(start)
        .map_err(|_| CoreError::NotARepository(start.to_path_buf()))?;
    main_worktree_root(&repo).ok_or_else(|| CoreError::NotARepository(start.to_path_buf()))
}

fn main_worktree_root(repo: &Repository) -> Option<PathBuf> {
    if repo.is_worktree() {
        // commondir is `<main>/.git/` for a linked worktree.
        return repo.commondir().parent().map(Path::to_path_buf);
    }
    repo.workdir().map(|p| p.components().collect())
}

/// The branch `HEAD` points at, `"detached"` for a detached head.
///
/// Works for unborn branches (fresh repositories with no commits).
pub(crate) fn head_branch(repo: &Repository) -> Result<String> {
    if repo.head_detached()? {
        return Ok("detached".to_owned());
    }
    let head = repo.find_reference("HEAD")?;
    let target = head.symbolic_target().unwrap_or_default();
    Ok(target.strip_prefix("refs/heads/").unwrap_or(target).to_owned())
}

/// The remote's default branch (`origin/HEAD`), or `"main"` when unknown.
pub fn default_branch(repo_root: &Path) -> String {
    let lookup = || -> Result<Option<String>> {
        let repo = Repository::open(repo_root)?;
        let reference = repo.find_reference("refs/remotes/origin/HEAD")?;
        Ok(reference
            .symbolic_target()
            .and_then(|t| t.strip_prefix("refs/remotes/origin/"))
            .map(str::to_owned))
    };
    lookup().ok().flatten().unwrap_or_else(|| "main".to_owned())
}

/// URL of the `origin` remote, if configured.
pub fn remote_url(repo_root: &Path) -> Option<String> {
    let repo = Repository::open(repo_root).ok()?;
    let remote = repo.find_remote("origin").ok()?;
    remote.url().map(str::to_owned)
}

/// Whether local `branch` in the repository at `path` tracks a remote branch.
pub fn has_upstream(path: &Path, branch: &str) -> bool {
    let check = || -> Result<bool> {
        let repo = Repository::open(path)?;
        let local = repo.find_branch(branch, BranchType::Local)?;
        let tracked = local.upstream().is_ok();
        Ok(tracked)
    };
    check().unwrap_or(false)
}
