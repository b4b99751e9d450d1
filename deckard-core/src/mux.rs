//! Background terminal sessions (tmux) and the liveness probe built on them.
//!
//! All sessions live on a dedicated tmux socket so they never mix with the
//! user's own tmux server. The session name is the worktree slug, which makes
//! the slug the sole key for the process resource.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::Result;
use crate::process::{CommandRunner, Invocation};

/// Default sampling window for idle detection.
pub const IDLE_SAMPLE_WINDOW: Duration = Duration::from_millis(300);

const TMUX: &str = "tmux";

const TMUX_CONF: &str = "# deckard tmux config, rewritten on every session start\n\
# Ctrl+] returns to the dashboard without stopping the agent\n\
bind-key -n C-] detach-client\n\
# Mouse wheel / PageUp enter scroll mode for reading long output\n\
set -g mouse on\n\
bind-key -n PageUp copy-mode\n";

/// A program plus arguments that takes over the terminal when run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachCommand {
    pub program: String,
    pub args: Vec<String>,
}

#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// `true` if a session named `slug` is registered.
    async fn exists(&self, slug: &str) -> bool;

    /// Visible pane contents of `slug`; empty when the capture fails.
    async fn sample(&self, slug: &str) -> Vec<u8>;

    /// Starts the agent in a detached session for `slug` unless one exists.
    async fn ensure(&self, slug: &str, workdir: &Path) -> Result<()>;

    /// Command that attaches the current terminal to `slug`.
    fn attach_command(&self, slug: &str) -> AttachCommand;
}

/// tmux session name for `slug`.
///
/// tmux rewrites `.` and `:` in session names to `_`, so the name is mapped
/// the same way up front and every command agrees on it.
pub fn session_name(slug: &str) -> String {
    slug.replace(['.', ':'], "_")
}

/// tmux on a private socket (`tmux -L <socket>`).
pub struct TmuxMultiplexer {
    runner: Arc<dyn CommandRunner>,
    socket: String,
    agent_command: Vec<String>,
    /// Where the generated tmux.conf is written; `None` skips it.
    config_path: Option<PathBuf>,
}

impl TmuxMultiplexer {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        socket: impl Into<String>,
        agent_command: Vec<String>,
        config_path: Option<PathBuf>,
    ) -> Self {
        Self { runner, socket: socket.into(), agent_command, config_path }
    }

    fn invocation<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = vec!["-L".to_owned(), self.socket.clone()];
        all.extend(args.into_iter().map(Into::into));
        Invocation::new(TMUX, all)
    }

    /// `-t` target matching the session named after `slug` exactly.
    ///
    /// A bare name is a prefix match in tmux, so `feat` would also hit
    /// `feat-v2`; `=` pins it to the whole name.
    fn target(slug: &str) -> String {
        format!("={}", session_name(slug))
    }

    /// Writes the tmux config and returns its path, if configured.
    async fn write_config(&self) -> Result<Option<&Path>> {
        let Some(path) = self.config_path.as_deref() else {
            return Ok(None);
        };
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, TMUX_CONF).await?;
        Ok(Some(path))
    }
}

#[async_trait]
impl Multiplexer for TmuxMultiplexer {
    async fn exists(&self, slug: &str) -> bool {
        match self.runner.run(self.invocation(["has-session".to_owned(), "-t".to_owned(), Self::target(slug)])).await {
            Ok(out) => out.success,
            Err(err) => {
                debug!(slug, error = %err, "tmux has-session failed");
                false
            }
        }
    }

    async fn sample(&self, slug: &str) -> Vec<u8> {
        match self.runner.run(self.invocation([
            "capture-pane".to_owned(),
            "-t".to_owned(),
            format!("{}:", Self::target(slug)),
            "-p".to_owned(),
            "-J".to_owned(),
        ])).await {
            Ok(out) if out.success => out.stdout,
            Ok(_) => Vec::new(),
            Err(err) => {
                debug!(slug, error = %err, "tmux capture-pane failed");
                Vec::new()
            }
        }
    }

    async fn ensure(&self, slug: &str, workdir: &Path) -> Result<()> {
        if self.exists(slug).await {
            return Ok(());
        }
        let mut args = vec!["-L".to_owned(), self.socket.clone()];
        if let Some(conf) = self.write_config().await? {
            args.push("-f".to_owned());
            args.push(conf.to_string_lossy().into_owned());
        }
        args.extend([
            "new-session".to_owned(),
            "-d".to_owned(),
            "-s".to_owned(),
            session_name(slug),
            "-c".to_owned(),
            workdir.to_string_lossy().into_owned(),
        ]);
        args.extend(self.agent_command.iter().cloned());

        self.runner.run(Invocation::new(TMUX, args)).await?.into_result("tmux new-session")?;
        info!(slug, workdir = %workdir.display(), "started background session");
        Ok(())
    }

    fn attach_command(&self, slug: &str) -> AttachCommand {
        AttachCommand {
            program: TMUX.to_owned(),
            args: vec![
                "-L".to_owned(),
                self.socket.clone(),
                "attach-session".to_owned(),
                "-t".to_owned(),
                Self::target(slug),
            ],
        }
    }
}

/// Liveness and idle detection over a [`Multiplexer`].
#[derive(Clone)]
pub struct LivenessProbe {
    mux: Arc<dyn Multiplexer>,
    window: Duration,
}

impl LivenessProbe {
    pub fn new(mux: Arc<dyn Multiplexer>, window: Duration) -> Self {
        Self { mux, window }
    }

    pub async fn session_exists(&self, slug: &str) -> bool {
        self.mux.exists(slug).await
    }

    /// Heuristic idle check: two pane snapshots `window` apart that are
    /// byte-identical mean the agent has stopped producing output and is
    /// waiting. A process that is silent for exactly the window while still
    /// working is misclassified as idle. Only meaningful for live sessions.
    pub async fn needs_input(&self, slug: &str) -> bool {
        let first = self.mux.sample(slug).await;
        tokio::time::sleep(self.window).await;
        let second = self.mux.sample(slug).await;
        first == second
    }
}
