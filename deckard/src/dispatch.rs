//! Command dispatcher.
//!
//! The state machine never performs I/O itself. It emits [`Command`]s, which
//! the [`Dispatcher`] runs on spawned tokio tasks. Each task reports back
//! exactly once with a [`TaskOutcome`] on the event channel, so all state
//! mutation stays on the event loop.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use deckard_core::enrich::Enricher;
use deckard_core::forge::{self, CreateReviewOpts, Forge, UpdateReviewOpts};
use deckard_core::git::{self, GitOps, GitWorktrees, WorktreeSource};
use deckard_core::mux::{AttachCommand, LivenessProbe, Multiplexer, TmuxMultiplexer};
use deckard_core::process::CommandRunner;
use deckard_core::types::{ForgeKind, Session, Worktree};
use deckard_core::{CoreError, Result};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::event::AppEvent;

/// Repository facts resolved once at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    pub root: PathBuf,
    pub default_branch: String,
    pub forge: Option<ForgeKind>,
}

/// A unit of asynchronous work requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resolve the repository and build the services.
    Bootstrap,
    /// One enrichment cycle, tagged so stale results can be dropped.
    Refresh { cycle: u64 },
    CreateWorktree { branch: String },
    /// Start the session if needed, then hand the terminal over.
    EnsureAndAttach { slug: String, path: PathBuf },
    /// Run by the event loop itself: it owns the terminal.
    Attach(AttachCommand),
    Commit { path: PathBuf, message: String },
    Push { path: PathBuf, branch: String },
    /// Pushes the head branch first when it has no upstream yet.
    CreateReview(CreateReviewOpts),
    UpdateReview { number: u64, draft: bool },
    DeleteWorktree { path: PathBuf, branch: String },
    OpenUrl { url: String },
}

/// Result of a finished [`Command`], delivered as [`AppEvent::Task`].
#[derive(Debug)]
pub enum TaskOutcome {
    Bootstrapped(Result<RepoContext>),
    Refreshed { cycle: u64, result: Result<Vec<Session>> },
    WorktreeCreated(Result<Worktree>),
    AttachReady { slug: String, result: Result<AttachCommand> },
    /// The attached terminal session returned control.
    AttachEnded,
    Committed(Result<()>),
    Pushed(Result<()>),
    ReviewCreated(Result<()>),
    ReviewUpdated(Result<()>),
    WorktreeDeleted(Result<()>),
}

/// Everything a background command needs, shared by all tasks.
pub struct Services {
    pub context: RepoContext,
    worktrees: Arc<dyn WorktreeSource>,
    git: GitOps,
    mux: Arc<dyn Multiplexer>,
    forge: Option<Arc<dyn Forge>>,
    enricher: Enricher,
}

impl Services {
    pub fn new(
        context: RepoContext,
        worktrees: Arc<dyn WorktreeSource>,
        git: GitOps,
        mux: Arc<dyn Multiplexer>,
        forge: Option<Arc<dyn Forge>>,
        probe: LivenessProbe,
    ) -> Self {
        let enricher = Enricher::new(worktrees.clone(), probe, forge.clone());
        Self { context, worktrees, git, mux, forge, enricher }
    }

    /// Resolves the repository around `start` and wires the real backends.
    pub async fn bootstrap(config: &Config, start: &Path, runner: Arc<dyn CommandRunner>) -> Result<Self> {
        let start = start.to_path_buf();
        let (root, default_branch, remote) = tokio::task::spawn_blocking(move || {
            let root = git::discover_root(&start)?;
            let default_branch = git::default_branch(&root);
            let remote = git::remote_url(&root);
            Ok::<_, CoreError>((root, default_branch, remote))
        })
        .await
        .map_err(|e| CoreError::Join(e.to_string()))??;

        let forge = forge::detect(&root, remote.as_deref(), runner.clone(), config.forge_timeouts()).await;
        let context = RepoContext {
            root: root.clone(),
            default_branch,
            forge: forge.as_ref().map(|f| f.kind()),
        };
        info!(root = %root.display(), base = %context.default_branch, forge = ?context.forge, "bootstrapped");

        let worktrees: Arc<dyn WorktreeSource> =
            Arc::new(GitWorktrees::new(runner.clone(), root, config.worktree_dir.clone()));
        let mux: Arc<dyn Multiplexer> = Arc::new(TmuxMultiplexer::new(
            runner.clone(),
            config.tmux_socket.clone(),
            config.agent_command.clone(),
            Some(config.tmux_conf_path()),
        ));
        let probe = LivenessProbe::new(mux.clone(), config.idle_window());
        Ok(Self::new(context, worktrees, GitOps::new(runner), mux, forge, probe))
    }

    /// Executes one command to completion.
    ///
    /// `Bootstrap`, `Attach` and `OpenUrl` are handled by the [`Dispatcher`]
    /// and yield `None` here.
    pub async fn run(&self, command: Command) -> Option<TaskOutcome> {
        let outcome = match command {
            Command::Refresh { cycle } => TaskOutcome::Refreshed { cycle, result: self.enricher.run_cycle().await },
            Command::CreateWorktree { branch } => TaskOutcome::WorktreeCreated(self.worktrees.create(&branch).await),
            Command::EnsureAndAttach { slug, path } => {
                let result = self.mux.ensure(&slug, &path).await.map(|()| self.mux.attach_command(&slug));
                TaskOutcome::AttachReady { slug, result }
            }
            Command::Commit { path, message } => TaskOutcome::Committed(self.git.commit(&path, &message).await),
            Command::Push { path, branch } => TaskOutcome::Pushed(self.git.push(&path, &branch).await),
            Command::CreateReview(opts) => TaskOutcome::ReviewCreated(self.create_review(&opts).await),
            Command::UpdateReview { number, draft } => {
                TaskOutcome::ReviewUpdated(self.update_review(number, draft).await)
            }
            Command::DeleteWorktree { path, branch } => {
                TaskOutcome::WorktreeDeleted(self.worktrees.delete(&path, &branch).await)
            }
            Command::Bootstrap | Command::Attach(_) | Command::OpenUrl { .. } => return None,
        };
        Some(outcome)
    }

    fn forge(&self) -> Result<&Arc<dyn Forge>> {
        self.forge.as_ref().ok_or_else(|| CoreError::CommandFailed {
            program: "forge".to_owned(),
            detail: "no GitHub or GitLab remote detected".to_owned(),
        })
    }

    async fn create_review(&self, opts: &CreateReviewOpts) -> Result<()> {
        let forge = self.forge()?;
        self.git.push_if_untracked(&opts.workdir, &opts.head_branch).await?;
        forge.create_review(opts).await
    }

    async fn update_review(&self, number: u64, draft: bool) -> Result<()> {
        self.forge()?.update_review(number, &UpdateReviewOpts { draft: Some(draft) }).await
    }
}

/// Spawns background work for commands and routes outcomes to the event loop.
pub struct Dispatcher {
    tx: UnboundedSender<AppEvent>,
    config: Arc<Config>,
    runner: Arc<dyn CommandRunner>,
    start_dir: PathBuf,
    services: Arc<OnceLock<Arc<Services>>>,
}

impl Dispatcher {
    pub fn new(tx: UnboundedSender<AppEvent>, config: Arc<Config>, runner: Arc<dyn CommandRunner>, start_dir: PathBuf) -> Self {
        Self { tx, config, runner, start_dir, services: Arc::new(OnceLock::new()) }
    }

    /// A dispatcher whose services are already built.
    #[cfg(test)]
    pub fn with_services(tx: UnboundedSender<AppEvent>, services: Services) -> Self {
        let dispatcher = Self::new(
            tx,
            Arc::new(Config::default()),
            Arc::new(deckard_core::process::ProcessRunner),
            PathBuf::from("."),
        );
        let _ = dispatcher.services.set(Arc::new(services));
        dispatcher
    }

    pub fn dispatch(&self, command: Command) {
        debug!(?command, "dispatch");
        match command {
            Command::Bootstrap => self.spawn_bootstrap(),
            Command::OpenUrl { url } => open_url(&url),
            Command::Attach(_) => warn!("attach commands are run by the event loop"),
            command => {
                let Some(services) = self.services.get().cloned() else {
                    warn!(?command, "dropping command issued before bootstrap");
                    return;
                };
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    if let Some(outcome) = services.run(command).await {
                        let _ = tx.send(AppEvent::Task(outcome));
                    }
                });
            }
        }
    }

    fn spawn_bootstrap(&self) {
        if let Some(services) = self.services.get() {
            let _ = self.tx.send(AppEvent::Task(TaskOutcome::Bootstrapped(Ok(services.context.clone()))));
            return;
        }
        let (tx, config, runner, start, cell) = (
            self.tx.clone(),
            self.config.clone(),
            self.runner.clone(),
            self.start_dir.clone(),
            self.services.clone(),
        );
        tokio::spawn(async move {
            let outcome = match Services::bootstrap(&config, &start, runner).await {
                Ok(services) => {
                    let context = services.context.clone();
                    let _ = cell.set(Arc::new(services));
                    Ok(context)
                }
                Err(err) => {
                    warn!(error = %err, "bootstrap failed");
                    Err(err)
                }
            };
            let _ = tx.send(AppEvent::Task(TaskOutcome::Bootstrapped(outcome)));
        });
    }
}

/// Opens `url` in the desktop browser without blocking the event loop.
fn open_url(url: &str) {
    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    if let Err(err) = launch(opener, url) {
        warn!(opener, url, error = %err, "could not open url");
    }
}

/// Spawns `program url` detached from the terminal and reaps it in the
/// background once it exits.
fn launch(program: &str, url: &str) -> std::io::Result<tokio::task::JoinHandle<()>> {
    let mut child = tokio::process::Command::new(program)
        .arg(url)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;
    let program = program.to_owned();
    Ok(tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if !status.success() => debug!(program, %status, "opener exited unsuccessfully"),
            Ok(_) => {}
            Err(err) => warn!(program, error = %err, "could not wait for opener"),
        }
    }))
}
