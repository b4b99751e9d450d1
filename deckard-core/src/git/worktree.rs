use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use git2::Repository;
use tracing::{debug, info, warn};

use super::head_branch;
use crate::error::{CoreError, Result};
use crate::process::{CommandRunner, Invocation};
use crate::types::{branch_to_slug, Worktree};

/// Supplies the current set of worktrees and creates/removes them.
#[async_trait]
pub trait WorktreeSource: Send + Sync {
    /// All worktrees of the repository, main worktree first.
    async fn list(&self) -> Result<Vec<Worktree>>;

    /// Creates a worktree on a new branch and returns it.
    async fn create(&self, branch: &str) -> Result<Worktree>;

    /// Removes the worktree at `path`, then deletes `branch` if it is merged.
    async fn delete(&self, path: &Path, branch: &str) -> Result<()>;
}

/// Worktrees of a local repository, new ones placed under `<root>/<worktree_dir>/<slug>`.
pub struct GitWorktrees {
    runner: Arc<dyn CommandRunner>,
    root: PathBuf,
    worktree_dir: PathBuf,
}

impl GitWorktrees {
    pub fn new(runner: Arc<dyn CommandRunner>, root: impl Into<PathBuf>, worktree_dir: impl Into<PathBuf>) -> Self {
        Self { runner, root: root.into(), worktree_dir: worktree_dir.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a worktree for `branch` is created.
    pub fn path_for(&self, branch: &str) -> PathBuf {
        self.root.join(&self.worktree_dir).join(branch_to_slug(branch))
    }
}

/// Enumerates worktrees with git2, `root` being the main worktree. Linked
/// worktrees whose directory has vanished (prunable) are skipped.
pub fn list_worktrees(root: &Path) -> Result<Vec<Worktree>> {
    let repo = Repository::open(root)?;
    let mut worktrees = vec![Worktree::new(root, head_branch(&repo)?)];

    for name in repo.worktrees()?.iter().flatten() {
        let wt = match repo.find_worktree(name) {
            Ok(wt) => wt,
            Err(err) => {
                debug!(worktree = name, error = %err, "skipping unreadable worktree");
                continue;
            }
        };
        if wt.validate().is_err() {
            debug!(worktree = name, "skipping prunable worktree");
            continue;
        }
        let linked = Repository::open_from_worktree(&wt)?;
        let path = wt.path().components().collect::<PathBuf>();
        worktrees.push(Worktree::new(path, head_branch(&linked)?));
    }
    Ok(worktrees)
}

#[async_trait]
impl WorktreeSource for GitWorktrees {
    async fn list(&self) -> Result<Vec<Worktree>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || list_worktrees(&root))
            .await
            .map_err(|e| CoreError::Join(e.to_string()))?
    }

    async fn create(&self, branch: &str) -> Result<Worktree> {
        let path = self.path_for(branch);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(CoreError::SlugTaken(branch_to_slug(branch)));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let path_arg = path.to_string_lossy().into_owned();
        let add = Invocation::new("git", ["worktree", "add", path_arg.as_str(), "-b", branch]).cwd(&self.root);
        self.runner.run(add).await?.into_result("git worktree add")?;

        info!(branch, path = %path.display(), "created worktree");
        Ok(Worktree::new(path, branch))
    }

    async fn delete(&self, path: &Path, branch: &str) -> Result<()> {
        let path_arg = path.to_string_lossy().into_owned();
        let remove = Invocation::new("git", ["worktree", "remove", path_arg.as_str()]).cwd(&self.root);
        self.runner.run(remove).await?.into_result("git worktree remove")?;

        // Unmerged branches are kept; `-d` refuses to delete them.
        let delete_branch = Invocation::new("git", ["branch", "-d", branch]).cwd(&self.root);
        match self.runner.run(delete_branch).await.and_then(|out| out.into_result("git branch -d")) {
            Ok(_) => info!(branch, "deleted worktree and branch"),
            Err(err) => warn!(branch, error = %err, "worktree removed, branch kept"),
        }
        Ok(())
    }
}
