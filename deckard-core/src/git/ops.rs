use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::{CoreError, Result};
use crate::process::{CommandRunner, Invocation};

/// Pushing talks to the network and may prompt credential helpers.
const PUSH_TIMEOUT: Duration = Duration::from_secs(60);

/// Mutating git operations run inside a worktree.
#[derive(Clone)]
pub struct GitOps {
    runner: Arc<dyn CommandRunner>,
}

impl GitOps {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Stages everything in the worktree and commits it with `message`.
    pub async fn commit(&self, path: &Path, message: &str) -> Result<()> {
        let add = Invocation::new("git", ["add", "-A"]).cwd(path);
        self.runner.run(add).await?.into_result("git add")?;

        let commit = Invocation::new("git", ["commit", "-m", message]).cwd(path);
        self.runner.run(commit).await?.into_result("git commit")?;
        info!(path = %path.display(), message, "committed");
        Ok(())
    }

    /// Pushes `branch` to `origin`, setting it as upstream.
    pub async fn push(&self, path: &Path, branch: &str) -> Result<()> {
        let push = Invocation::new("git", ["push", "-u", "origin", branch])
            .cwd(path)
            .timeout(PUSH_TIMEOUT);
        self.runner.run(push).await?.into_result("git push")?;
        info!(branch, "pushed");
        Ok(())
    }

    /// Pushes `branch` unless it already tracks a remote branch.
    pub async fn push_if_untracked(&self, path: &Path, branch: &str) -> Result<()> {
        let (check_path, check_branch) = (path.to_path_buf(), branch.to_owned());
        let tracked = tokio::task::spawn_blocking(move || super::has_upstream(&check_path, &check_branch))
            .await
            .map_err(|e| CoreError::Join(e.to_string()))?;
        if tracked {
            return Ok(());
        }
        self.push(path, branch).await
    }
}
