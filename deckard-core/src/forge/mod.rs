//! Uniform review-request interface over GitHub (`gh`) and GitLab (`glab`).
//!
//! The backend is chosen once at startup by [`detect`]; afterwards callers
//! only see `Arc<dyn Forge>`. Each backend owns its raw-to-normalised status
//! tables so that both report the same [`PipelineStatus`] vocabulary.

mod github;
mod gitlab;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;
use crate::process::{CommandRunner, Invocation};
use crate::types::{ForgeKind, Review};

pub use github::GitHub;
pub use gitlab::GitLab;

/// Parameters for opening a new review request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateReviewOpts {
    pub title: String,
    pub base_branch: String,
    /// Source branch of the review; must already exist on the remote.
    pub head_branch: String,
    pub draft: bool,
    /// Worktree the CLI runs in.
    pub workdir: PathBuf,
}

/// Parameters for updating an existing review. `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReviewOpts {
    pub draft: Option<bool>,
}

/// Per-call timeouts applied by both backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForgeTimeouts {
    pub fetch: Duration,
    pub create: Duration,
    pub update: Duration,
}

impl Default for ForgeTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(10),
            create: Duration::from_secs(30),
            update: Duration::from_secs(15),
        }
    }
}

#[async_trait]
pub trait Forge: Send + Sync {
    fn kind(&self) -> ForgeKind;

    /// Returns the most relevant review for `branch`, or `None` when there is
    /// none or the CLI is missing, times out, or prints something unparsable.
    async fn fetch_review(&self, branch: &str) -> Option<Review>;

    async fn create_review(&self, opts: &CreateReviewOpts) -> Result<()>;

    async fn update_review(&self, number: u64, opts: &UpdateReviewOpts) -> Result<()>;
}

/// Which backend a remote URL points at, if it is recognisable from the URL alone.
pub fn classify_remote(url: &str) -> Option<ForgeKind> {
    let url = url.trim().to_lowercase();
    if url.contains("github.com") {
        Some(ForgeKind::GitHub)
    } else if url.contains("gitlab") {
        Some(ForgeKind::GitLab)
    } else {
        None
    }
}

/// Picks the backend for the repository at `repo_root`.
///
/// `remote_url` is the `origin` URL, if any. An unrecognised remote falls back
/// to probing `glab repo view`, which succeeds for self-hosted GitLab
/// instances glab is configured for. Returns `None` when nothing matches.
pub async fn detect(
    repo_root: &Path,
    remote_url: Option<&str>,
    runner: Arc<dyn CommandRunner>,
    timeouts: ForgeTimeouts,
) -> Option<Arc<dyn Forge>> {
    let remote_url = remote_url?;
    let kind = match classify_remote(remote_url) {
        Some(kind) => kind,
        None => {
            let probe = Invocation::new("glab", ["repo", "view"])
                .cwd(repo_root)
                .timeout(timeouts.fetch);
            match runner.run(probe).await {
                Ok(out) if out.success => ForgeKind::GitLab,
                _ => {
                    debug!(remote = remote_url, "no forge recognised for remote");
                    return None;
                }
            }
        }
    };
    info!(forge = %kind, "detected forge");
    Some(build(kind, repo_root, runner, timeouts))
}

/// Constructs the backend for `kind`.
pub fn build(
    kind: ForgeKind,
    repo_root: &Path,
    runner: Arc<dyn CommandRunner>,
    timeouts: ForgeTimeouts,
) -> Arc<dyn Forge> {
    match kind {
        ForgeKind::GitHub => Arc::new(GitHub::new(runner, repo_root, timeouts)),
        ForgeKind::GitLab => Arc::new(GitLab::new(runner, repo_root, timeouts)),
    }
}

/// Prefers the first candidate that is open, else the first one returned.
///
/// Both CLIs list newest first, so "first" is the most recent.
pub(crate) fn select_candidate<T>(candidates: Vec<T>, is_open: impl Fn(&T) -> bool) -> Option<T> {
    let open_index = candidates.iter().position(&is_open);
    let index = open_index.unwrap_or(0);
    candidates.into_iter().nth(index)
}
