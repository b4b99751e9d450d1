//! Central application state for deckard.
//!
//! `AppState` owns the fleet view, the current interaction [`Mode`] and the
//! refresh bookkeeping. It never performs I/O: user intent and task results
//! come in through methods, and the asynchronous work they imply goes out as
//! [`Command`]s for the dispatcher. Rendering reads it; the keybinding
//! dispatcher and the event loop mutate it.

use std::fmt::Display;
use std::time::{Duration, Instant};

use deckard_core::forge::CreateReviewOpts;
use deckard_core::types::{branch_to_slug, branch_to_title, Review, Session};
use ratatui::widgets::ListState;
use tracing::{debug, info};

use crate::dispatch::{Command, RepoContext, TaskOutcome};

/// Conventional-commit prefixes offered by the commit-type menu.
pub const COMMIT_TYPES: &[(char, &str)] = &[
    ('f', "feat"),
    ('x', "fix"),
    ('r', "refactor"),
    ('d', "docs"),
    ('t', "test"),
    ('c', "chore"),
    ('i', "ci"),
    ('p', "perf"),
];

pub fn commit_type_for(key: char) -> Option<&'static str> {
    COMMIT_TYPES.iter().find(|(k, _)| *k == key).map(|(_, name)| *name)
}

/// Focused field of the create-review form.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ReviewField {
    #[default]
    Title,
    Base,
    Draft,
}

impl ReviewField {
    pub fn next(self) -> Self {
        match self {
            ReviewField::Title => ReviewField::Base,
            ReviewField::Base => ReviewField::Draft,
            ReviewField::Draft => ReviewField::Title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewForm {
    pub title: String,
    pub base: String,
    pub draft: bool,
    pub focus: ReviewField,
}

impl ReviewForm {
    /// The focused text buffer, `None` while the draft toggle is focused.
    pub fn focused_text(&mut self) -> Option<&mut String> {
        match self.focus {
            ReviewField::Title => Some(&mut self.title),
            ReviewField::Base => Some(&mut self.base),
            ReviewField::Draft => None,
        }
    }
}

/// Interaction mode. Modal variants carry their own input buffers and an
/// owned copy of the session they act on, taken when the modal opened.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Normal,
    NewSession { branch: String },
    SelectCommitType { target: Session },
    ComposeCommit { target: Session, commit_type: &'static str, message: String },
    ConfirmDelete { target: Session },
    CreateReview { target: Session, form: ReviewForm },
    ManageReview { target: Session, review: Review },
}

impl Mode {
    pub fn is_normal(&self) -> bool {
        matches!(self, Mode::Normal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

/// Footer notification. Error lines have no expiry and are cleared by the
/// next key press instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub text: String,
    pub expires: Option<Instant>,
}

pub struct AppState {
    pub mode: Mode,
    /// Latest published fleet, replaced wholesale by each refresh.
    pub sessions: Vec<Session>,
    pub list_state: ListState,
    /// Validation or task error shown inside the active modal.
    pub input_error: Option<String>,
    pub status: Option<StatusLine>,
    /// Whole-screen error: the repository could not be read.
    pub fatal: Option<String>,
    pub context: Option<RepoContext>,
    /// A refresh is running; drives the header spinner.
    pub loading: bool,
    pub spinner_frame: usize,
    /// A modal's command is running; further submits are ignored.
    pub busy: bool,
    cycle: u64,
    refresh_in_flight: bool,
    refresh_queued: bool,
    /// Slug to select once it shows up in a refresh.
    pending_select: Option<String>,
    status_ttl: Duration,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

impl AppState {
    pub fn new(status_ttl: Duration) -> Self {
        Self {
            mode: Mode::Normal,
            sessions: Vec::new(),
            list_state: ListState::default(),
            input_error: None,
            status: None,
            fatal: None,
            context: None,
            loading: true,
            spinner_frame: 0,
            busy: false,
            cycle: 0,
            refresh_in_flight: false,
            refresh_queued: false,
            pending_select: None,
            status_ttl,
        }
    }

    pub fn selected(&self) -> Option<&Session> {
        self.list_state.selected().and_then(|i| self.sessions.get(i))
    }

    pub fn select_next(&mut self) {
        if !self.sessions.is_empty() {
            let next = self.list_state.selected().map_or(0, |i| (i + 1).min(self.sessions.len() - 1));
            self.list_state.select(Some(next));
        }
    }

    pub fn select_prev(&mut self) {
        if !self.sessions.is_empty() {
            let prev = self.list_state.selected().map_or(0, |i| i.saturating_sub(1));
            self.list_state.select(Some(prev));
        }
    }

    pub fn select_first(&mut self) {
        if !self.sessions.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        if !self.sessions.is_empty() {
            self.list_state.select(Some(self.sessions.len() - 1));
        }
    }

    /// `true` when `path` is the main worktree, which must never be deleted.
    pub fn is_repo_root(&self, session: &Session) -> bool {
        self.context.as_ref().is_some_and(|ctx| ctx.root == session.path)
    }

    pub fn has_forge(&self) -> bool {
        self.context.as_ref().is_some_and(|ctx| ctx.forge.is_some())
    }

    // -----------------------------------------------------------------------
    // Mode transitions
    // -----------------------------------------------------------------------

    pub fn enter(&mut self, mode: Mode) {
        self.mode = mode;
        self.input_error = None;
        self.busy = false;
    }

    pub fn to_normal(&mut self) {
        self.enter(Mode::Normal);
    }

    /// Opens the create-review form, pre-filled from the session's branch
    /// and the repository's default branch.
    pub fn open_create_review(&mut self, target: Session) {
        let base = self.context.as_ref().map(|c| c.default_branch.clone()).unwrap_or_default();
        let form = ReviewForm {
            title: branch_to_title(&target.branch),
            base,
            draft: false,
            focus: ReviewField::Title,
        };
        self.enter(Mode::CreateReview { target, form });
    }

    /// Records a validation failure without dispatching anything.
    pub fn reject(&mut self, message: impl Into<String>) {
        self.input_error = Some(message.into());
    }

    /// Marks the modal as waiting for `command` and returns it.
    pub fn submit(&mut self, command: Command) -> Command {
        self.input_error = None;
        self.busy = true;
        command
    }

    /// Validates the new-session branch name.
    pub fn validate_branch(&self, branch: &str) -> Result<(), String> {
        if branch.is_empty() {
            return Err("branch name is required".to_owned());
        }
        if branch.chars().any(char::is_whitespace) {
            return Err("branch name cannot contain spaces".to_owned());
        }
        let slug = branch_to_slug(branch);
        if self.sessions.iter().any(|s| s.slug == slug) {
            return Err(format!("a session named '{slug}' already exists"));
        }
        Ok(())
    }

    /// Builds the create-review command from the form, or explains why not.
    pub fn review_submission(target: &Session, form: &ReviewForm) -> Result<Command, String> {
        let title = form.title.trim();
        let base = form.base.trim();
        if title.is_empty() {
            return Err("title is required".to_owned());
        }
        if base.is_empty() {
            return Err("base branch is required".to_owned());
        }
        Ok(Command::CreateReview(CreateReviewOpts {
            title: title.to_owned(),
            base_branch: base.to_owned(),
            head_branch: target.branch.clone(),
            draft: form.draft,
            workdir: target.path.clone(),
        }))
    }

    // -----------------------------------------------------------------------
    // Status line
    // -----------------------------------------------------------------------

    pub fn set_status(&mut self, level: StatusLevel, text: impl Into<String>) {
        let expires = match level {
            StatusLevel::Error => None,
            StatusLevel::Info | StatusLevel::Warn => Some(Instant::now() + self.status_ttl),
        };
        self.status = Some(StatusLine { level, text: text.into(), expires });
    }

    /// Drops an error footer; called on every key press.
    pub fn acknowledge_error(&mut self) {
        if self.status.as_ref().is_some_and(|s| s.level == StatusLevel::Error) {
            self.status = None;
        }
    }

    /// Advances the spinner and expires timed status lines.
    pub fn tick(&mut self, now: Instant) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
        if self.status.as_ref().and_then(|s| s.expires).is_some_and(|at| now >= at) {
            self.status = None;
        }
    }

    // -----------------------------------------------------------------------
    // Refresh coalescing
    // -----------------------------------------------------------------------

    /// Starts an enrichment cycle unless one is running, in which case one
    /// more cycle is queued behind it.
    pub fn request_refresh(&mut self) -> Option<Command> {
        if self.context.is_none() {
            return None;
        }
        if self.refresh_in_flight {
            self.refresh_queued = true;
            return None;
        }
        self.cycle += 1;
        self.refresh_in_flight = true;
        self.loading = true;
        Some(Command::Refresh { cycle: self.cycle })
    }

    /// `r`: retries bootstrap until it has succeeded, refreshes afterwards.
    pub fn retry(&mut self) -> Option<Command> {
        if self.context.is_none() {
            self.loading = true;
            return Some(Command::Bootstrap);
        }
        self.request_refresh()
    }

    fn publish(&mut self, sessions: Vec<Session>) {
        let keep = self.pending_select.take().or_else(|| self.selected().map(|s| s.slug.clone()));
        self.sessions = sessions;
        let index = keep
            .and_then(|slug| self.sessions.iter().position(|s| s.slug == slug))
            .or_else(|| {
                let previous = self.list_state.selected().unwrap_or(0);
                (!self.sessions.is_empty()).then(|| previous.min(self.sessions.len() - 1))
            });
        self.list_state.select(index);
    }

    // -----------------------------------------------------------------------
    // Task outcomes
    // -----------------------------------------------------------------------

    /// Task failure: shown inside the modal that issued it, or in the footer
    /// when the user has already returned to normal mode.
    fn fail(&mut self, what: &str, err: impl Display) {
        self.busy = false;
        if self.mode.is_normal() {
            self.set_status(StatusLevel::Error, format!("✕ {what}: {err}"));
        } else {
            self.input_error = Some(err.to_string());
        }
    }

    /// Task success: back to normal mode with a note, then re-enrich.
    fn succeed(&mut self, note: &str) -> Vec<Command> {
        self.to_normal();
        self.set_status(StatusLevel::Info, format!("◆ {note}"));
        self.request_refresh().into_iter().collect()
    }

    /// Folds a finished task into the state, returning follow-up commands.
    pub fn apply_outcome(&mut self, outcome: TaskOutcome) -> Vec<Command> {
        match outcome {
            TaskOutcome::Bootstrapped(Ok(context)) => {
                self.context = Some(context);
                self.fatal = None;
                self.request_refresh().into_iter().collect()
            }
            TaskOutcome::Bootstrapped(Err(err)) => {
                self.loading = false;
                self.fatal = Some(err.to_string());
                Vec::new()
            }
            TaskOutcome::Refreshed { cycle, result } => {
                if !self.refresh_in_flight || cycle != self.cycle {
                    debug!(cycle, current = self.cycle, "discarding stale refresh");
                    return Vec::new();
                }
                self.refresh_in_flight = false;
                self.loading = false;
                match result {
                    Ok(sessions) => {
                        self.fatal = None;
                        self.publish(sessions);
                    }
                    Err(err) => self.fatal = Some(format!("failed to list worktrees: {err}")),
                }
                if std::mem::take(&mut self.refresh_queued) {
                    return self.request_refresh().into_iter().collect();
                }
                Vec::new()
            }
            TaskOutcome::WorktreeCreated(Ok(worktree)) => {
                info!(slug = %worktree.slug, "worktree created");
                self.to_normal();
                self.pending_select = Some(worktree.slug.clone());
                vec![Command::EnsureAndAttach { slug: worktree.slug, path: worktree.path }]
            }
            TaskOutcome::WorktreeCreated(Err(err)) => {
                self.fail("create failed", err);
                Vec::new()
            }
            TaskOutcome::AttachReady { result: Ok(attach), .. } => vec![Command::Attach(attach)],
            TaskOutcome::AttachReady { slug, result: Err(err) } => {
                self.to_normal();
                self.set_status(StatusLevel::Error, format!("✕ could not start {slug}: {err}"));
                self.request_refresh().into_iter().collect()
            }
            TaskOutcome::AttachEnded => {
                self.to_normal();
                self.request_refresh().into_iter().collect()
            }
            TaskOutcome::Committed(Ok(())) => self.succeed("committed"),
            TaskOutcome::Committed(Err(err)) => {
                self.fail("commit failed", err);
                Vec::new()
            }
            TaskOutcome::Pushed(Ok(())) => {
                self.set_status(StatusLevel::Info, "◆ pushed");
                self.request_refresh().into_iter().collect()
            }
            TaskOutcome::Pushed(Err(err)) => {
                self.set_status(StatusLevel::Error, format!("✕ push failed: {err}"));
                self.request_refresh().into_iter().collect()
            }
            TaskOutcome::ReviewCreated(Ok(())) => self.succeed("review created"),
            TaskOutcome::ReviewCreated(Err(err)) => {
                self.fail("review failed", err);
                Vec::new()
            }
            TaskOutcome::ReviewUpdated(Ok(())) => self.succeed("review updated"),
            TaskOutcome::ReviewUpdated(Err(err)) => {
                self.fail("review update failed", err);
                Vec::new()
            }
            TaskOutcome::WorktreeDeleted(Ok(())) => self.succeed("worktree deleted"),
            TaskOutcome::WorktreeDeleted(Err(err)) => {
                self.fail("delete failed", err);
                Vec::new()
            }
        }
    }

    /// Process exit code: non-zero when quitting from an unresolved fatal screen.
    pub fn exit_code(&self) -> u8 {
        u8::from(self.fatal.is_some())
    }
}
