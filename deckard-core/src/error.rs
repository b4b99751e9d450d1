use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by core operations.
///
/// Only explicit user actions (create, commit, push, review create/update,
/// ensure) return these to the caller. Read-only probes absorb their failures
/// and degrade to "absent" instead.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{program}: {detail}")]
    CommandFailed { program: String, detail: String },
    #[error("{program} timed out after {}s", after.as_secs())]
    Timeout { program: String, after: Duration },
    #[error("malformed output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("not inside a git repository: {}", .0.display())]
    NotARepository(PathBuf),
    #[error("a worktree for slug '{0}' already exists")]
    SlugTaken(String),
    #[error("background task failed: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Trims command output to a length that fits an inline error line.
pub(crate) fn trim_output(raw: &[u8]) -> String {
    const MAX: usize = 200;
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    if text.chars().count() > MAX {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}…")
    } else {
        text.to_owned()
    }
}
