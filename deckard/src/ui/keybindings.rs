//! Keybinding dispatcher for deckard.
//!
//! Translates crossterm `KeyEvent`s into `AppState` mutations and returns a
//! `KeyAction` telling the event loop whether to continue, quit, or dispatch
//! a command. The dispatcher branches first on the fatal screen, then on
//! `state.mode`, so each mode has an isolated handler.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::app::{commit_type_for, AppState, Mode, ReviewField, StatusLevel};
use crate::dispatch::Command;

/// Control-flow signal returned from the key dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Continue,
    Quit,
    /// Hand the command to the dispatcher.
    Dispatch(Command),
}

impl From<Option<Command>> for KeyAction {
    fn from(command: Option<Command>) -> Self {
        command.map_or(KeyAction::Continue, KeyAction::Dispatch)
    }
}

pub fn handle_key(key: KeyEvent, state: &mut AppState) -> KeyAction {
    state.acknowledge_error();
    if is_interrupt(&key) {
        return KeyAction::Quit;
    }
    if state.fatal.is_some() {
        return handle_fatal(key, state);
    }
    match state.mode {
        Mode::Normal => handle_normal(key, state),
        Mode::NewSession { .. } => handle_new_session(key, state),
        Mode::SelectCommitType { .. } => handle_commit_type(key, state),
        Mode::ComposeCommit { .. } => handle_compose_commit(key, state),
        Mode::ConfirmDelete { .. } => handle_confirm_delete(key, state),
        Mode::CreateReview { .. } => handle_create_review(key, state),
        Mode::ManageReview { .. } => handle_manage_review(key, state),
    }
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c')
}

// ---------------------------------------------------------------------------
// Fatal screen
// ---------------------------------------------------------------------------

fn handle_fatal(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('r') => state.retry().into(),
        KeyCode::Char('q') => KeyAction::Quit,
        _ => KeyAction::Continue,
    }
}

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

fn handle_normal(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => state.select_next(),
        KeyCode::Char('k') | KeyCode::Up => state.select_prev(),
        KeyCode::Char('g') | KeyCode::Home => state.select_first(),
        KeyCode::Char('G') | KeyCode::End => state.select_last(),
        KeyCode::Char('q') => return KeyAction::Quit,
        KeyCode::Char('r') => return state.request_refresh().into(),
        KeyCode::Char('n') => state.enter(Mode::NewSession { branch: String::new() }),
        code => return handle_session_key(code, state),
    }
    KeyAction::Continue
}

/// Normal-mode keys that act on the selected session.
fn handle_session_key(code: KeyCode, state: &mut AppState) -> KeyAction {
    let Some(target) = state.selected().cloned() else {
        return KeyAction::Continue;
    };
    match code {
        KeyCode::Enter => KeyAction::Dispatch(Command::EnsureAndAttach { slug: target.slug, path: target.path }),
        KeyCode::Char('c') => {
            state.enter(Mode::SelectCommitType { target });
            KeyAction::Continue
        }
        KeyCode::Char('p') => {
            state.set_status(StatusLevel::Info, format!("pushing {}…", target.branch));
            KeyAction::Dispatch(Command::Push { path: target.path, branch: target.branch })
        }
        KeyCode::Char('o') => match target.review {
            Some(review) => KeyAction::Dispatch(Command::OpenUrl { url: review.web_url }),
            None => {
                state.set_status(StatusLevel::Warn, "▲ no review to open");
                KeyAction::Continue
            }
        },
        KeyCode::Char('m') => {
            if !state.has_forge() {
                state.set_status(StatusLevel::Warn, "▲ no GitHub or GitLab remote detected");
                return KeyAction::Continue;
            }
            match target.review.clone() {
                Some(review) => state.enter(Mode::ManageReview { target, review }),
                None => state.open_create_review(target),
            }
            KeyAction::Continue
        }
        KeyCode::Char('d') => {
            if state.is_repo_root(&target) {
                state.set_status(StatusLevel::Warn, "▲ the main worktree cannot be deleted");
            } else {
                state.enter(Mode::ConfirmDelete { target });
            }
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

// ---------------------------------------------------------------------------
// Text-entry modes
// ---------------------------------------------------------------------------

/// Applies an editing key to `buffer`. Returns `true` if it was consumed.
fn edit(buffer: &mut String, code: KeyCode) -> bool {
    match code {
        KeyCode::Char(c) => buffer.push(c),
        KeyCode::Backspace => {
            buffer.pop();
        }
        _ => return false,
    }
    true
}

fn handle_new_session(key: KeyEvent, state: &mut AppState) -> KeyAction {
    let Mode::NewSession { branch } = &mut state.mode else {
        return KeyAction::Continue;
    };
    match key.code {
        KeyCode::Esc => state.to_normal(),
        KeyCode::Enter if !state.busy => {
            let branch = branch.trim().to_owned();
            match state.validate_branch(&branch) {
                Ok(()) => return KeyAction::Dispatch(state.submit(Command::CreateWorktree { branch })),
                Err(message) => state.reject(message),
            }
        }
        code => {
            edit(branch, code);
        }
    }
    KeyAction::Continue
}

fn handle_commit_type(key: KeyEvent, state: &mut AppState) -> KeyAction {
    let Mode::SelectCommitType { target } = &state.mode else {
        return KeyAction::Continue;
    };
    match key.code {
        KeyCode::Esc => state.to_normal(),
        KeyCode::Char(c) => {
            if let Some(commit_type) = commit_type_for(c) {
                let target = target.clone();
                state.enter(Mode::ComposeCommit { target, commit_type, message: String::new() });
            }
        }
        _ => {}
    }
    KeyAction::Continue
}

fn handle_compose_commit(key: KeyEvent, state: &mut AppState) -> KeyAction {
    let Mode::ComposeCommit { target, commit_type, message } = &mut state.mode else {
        return KeyAction::Continue;
    };
    match key.code {
        KeyCode::Esc => {
            let target = target.clone();
            state.enter(Mode::SelectCommitType { target });
        }
        KeyCode::Enter if !state.busy => {
            let description = message.trim();
            if description.is_empty() {
                state.reject("commit message is required");
            } else {
                let command = Command::Commit {
                    path: target.path.clone(),
                    message: format!("{commit_type}: {description}"),
                };
                return KeyAction::Dispatch(state.submit(command));
            }
        }
        code => {
            edit(message, code);
        }
    }
    KeyAction::Continue
}

fn handle_confirm_delete(key: KeyEvent, state: &mut AppState) -> KeyAction {
    let Mode::ConfirmDelete { target } = &state.mode else {
        return KeyAction::Continue;
    };
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter if !state.busy => {
            let command = Command::DeleteWorktree { path: target.path.clone(), branch: target.branch.clone() };
            KeyAction::Dispatch(state.submit(command))
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            state.to_normal();
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

fn handle_create_review(key: KeyEvent, state: &mut AppState) -> KeyAction {
    let Mode::CreateReview { target, form } = &mut state.mode else {
        return KeyAction::Continue;
    };
    match key.code {
        KeyCode::Esc => state.to_normal(),
        KeyCode::Tab => form.focus = form.focus.next(),
        KeyCode::Char(' ') if form.focus == ReviewField::Draft => form.draft = !form.draft,
        KeyCode::Enter if !state.busy => match AppState::review_submission(target, form) {
            Ok(command) => return KeyAction::Dispatch(state.submit(command)),
            Err(message) => state.reject(message),
        },
        code => {
            if let Some(buffer) = form.focused_text() {
                edit(buffer, code);
            }
        }
    }
    KeyAction::Continue
}

fn handle_manage_review(key: KeyEvent, state: &mut AppState) -> KeyAction {
    let Mode::ManageReview { review, .. } = &state.mode else {
        return KeyAction::Continue;
    };
    match key.code {
        KeyCode::Char('p') if !state.busy => {
            let command = Command::UpdateReview { number: review.number, draft: false };
            KeyAction::Dispatch(state.submit(command))
        }
        KeyCode::Char('d') if !state.busy => {
            let command = Command::UpdateReview { number: review.number, draft: true };
            KeyAction::Dispatch(state.submit(command))
        }
        KeyCode::Char('o') => {
            let url = review.web_url.clone();
            state.to_normal();
            KeyAction::Dispatch(Command::OpenUrl { url })
        }
        KeyCode::Esc => {
            state.to_normal();
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

// ---------------------------------------------------------------------------
// Mouse events
// ---------------------------------------------------------------------------

/// Scroll wheel moves the session selection in normal mode.
pub fn handle_mouse(mouse: MouseEvent, state: &mut AppState) -> KeyAction {
    if state.fatal.is_some() || !state.mode.is_normal() {
        return KeyAction::Continue;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => state.select_prev(),
        MouseEventKind::ScrollDown => state.select_next(),
        _ => {}
    }
    KeyAction::Continue
}

#[cfg(test)]
mod tests {
    use deckard_core::types::{branch_to_slug, ForgeKind, PipelineStatus, Review, ReviewState, Session, Worktree};

    use super::*;
    use crate::dispatch::{RepoContext, TaskOutcome};

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn typed(state: &mut AppState, text: &str) {
        for c in text.chars() {
            handle_key(press(KeyCode::Char(c)), state);
        }
    }

    fn session(branch: &str, path: &str) -> Session {
        Session::bare(Worktree::new(path, branch))
    }

    fn worktree_session(branch: &str) -> Session {
        session(branch, &format!("/repo/.claude/worktrees/{}", branch_to_slug(branch)))
    }

    fn state_with(sessions: Vec<Session>, forge: Option<ForgeKind>) -> AppState {
        let mut state = AppState::default();
        state.apply_outcome(TaskOutcome::Bootstrapped(Ok(RepoContext {
            root: "/repo".into(),
            default_branch: "main".into(),
            forge,
        })));
        state.apply_outcome(TaskOutcome::Refreshed { cycle: 1, result: Ok(sessions) });
        state
    }

    fn review(number: u64) -> Review {
        Review {
            number,
            title: "Add login".into(),
            web_url: format!("https://github.com/acme/widgets/pull/{number}"),
            state: ReviewState::Open,
            draft: true,
            pipeline_status: PipelineStatus::Running,
            has_unresolved_threads: false,
            forge_kind: ForgeKind::GitHub,
        }
    }

    #[test]
    fn new_session_cancel_has_no_side_effects() {
        let mut state = state_with(vec![session("main", "/repo")], None);
        let before = state.sessions.clone();

        assert_eq!(handle_key(press(KeyCode::Char('n')), &mut state), KeyAction::Continue);
        typed(&mut state, "feat/x");
        assert_eq!(state.mode, Mode::NewSession { branch: "feat/x".into() });
        assert_eq!(handle_key(press(KeyCode::Esc), &mut state), KeyAction::Continue);

        assert!(state.mode.is_normal());
        assert_eq!(state.sessions, before);
        assert!(state.input_error.is_none());
    }

    #[test]
    fn new_session_submits_trimmed_branch() {
        let mut state = state_with(vec![session("main", "/repo")], None);
        handle_key(press(KeyCode::Char('n')), &mut state);
        typed(&mut state, "feat/y");
        handle_key(press(KeyCode::Backspace), &mut state);
        typed(&mut state, "z");

        let action = handle_key(press(KeyCode::Enter), &mut state);
        assert_eq!(action, KeyAction::Dispatch(Command::CreateWorktree { branch: "feat/z".into() }));
        assert!(state.busy);
        assert_eq!(handle_key(press(KeyCode::Enter), &mut state), KeyAction::Continue, "no double submit");
    }

    #[test]
    fn new_session_rejects_empty_and_duplicate() {
        let mut state = state_with(vec![session("main", "/repo"), worktree_session("feat/a")], None);
        handle_key(press(KeyCode::Char('n')), &mut state);
        assert_eq!(handle_key(press(KeyCode::Enter), &mut state), KeyAction::Continue);
        assert!(state.input_error.is_some());

        typed(&mut state, "Feat/A");
        assert_eq!(handle_key(press(KeyCode::Enter), &mut state), KeyAction::Continue);
        assert!(state.input_error.as_deref().is_some_and(|e| e.contains("feat-a")));
    }

    #[test]
    fn create_review_with_empty_title_is_rejected() {
        let mut state = state_with(vec![session("main", "/repo"), worktree_session("feat/a")], Some(ForgeKind::GitHub));
        handle_key(press(KeyCode::Char('j')), &mut state);
        handle_key(press(KeyCode::Char('m')), &mut state);
        assert!(matches!(state.mode, Mode::CreateReview { .. }));

        for _ in 0.."Feat a".len() {
            handle_key(press(KeyCode::Backspace), &mut state);
        }
        let action = handle_key(press(KeyCode::Enter), &mut state);

        assert_eq!(action, KeyAction::Continue);
        assert_eq!(state.input_error.as_deref(), Some("title is required"));
        assert!(!state.busy);
        assert!(matches!(state.mode, Mode::CreateReview { .. }));
    }

    #[test]
    fn create_review_form_fields_and_submit() {
        let mut state = state_with(vec![worktree_session("feat/a")], Some(ForgeKind::GitLab));
        handle_key(press(KeyCode::Char('m')), &mut state);
        typed(&mut state, "!");
        handle_key(press(KeyCode::Tab), &mut state);
        handle_key(press(KeyCode::Char(' ')), &mut state);
        assert!(matches!(&state.mode, Mode::CreateReview { form, .. } if form.base == "main " && !form.draft));
        handle_key(press(KeyCode::Backspace), &mut state);
        handle_key(press(KeyCode::Tab), &mut state);
        handle_key(press(KeyCode::Char(' ')), &mut state);
        assert!(matches!(&state.mode, Mode::CreateReview { form, .. } if form.draft && form.focus == ReviewField::Draft));

        let Command::CreateReview(opts) = (match handle_key(press(KeyCode::Enter), &mut state) {
            KeyAction::Dispatch(command) => command,
            other => panic!("expected dispatch, got {other:?}"),
        }) else {
            panic!("expected create-review command");
        };
        assert_eq!(opts.title, "Feat a!");
        assert_eq!(opts.base_branch, "main");
        assert_eq!(opts.head_branch, "feat/a");
        assert!(opts.draft);
    }

    #[test]
    fn manage_review_keys() {
        let mut with_review = worktree_session("feat/a");
        with_review.review = Some(review(7));
        let mut state = state_with(vec![with_review], Some(ForgeKind::GitHub));

        handle_key(press(KeyCode::Char('m')), &mut state);
        assert!(matches!(state.mode, Mode::ManageReview { .. }));
        assert_eq!(
            handle_key(press(KeyCode::Char('p')), &mut state),
            KeyAction::Dispatch(Command::UpdateReview { number: 7, draft: false })
        );
        state.apply_outcome(TaskOutcome::ReviewUpdated(Ok(())));
        assert!(state.mode.is_normal());

        handle_key(press(KeyCode::Char('m')), &mut state);
        let action = handle_key(press(KeyCode::Char('o')), &mut state);
        assert!(matches!(action, KeyAction::Dispatch(Command::OpenUrl { ref url }) if url.ends_with("/7")));
        assert!(state.mode.is_normal());
    }

    #[test]
    fn manage_review_without_forge_warns() {
        let mut state = state_with(vec![worktree_session("feat/a")], None);
        handle_key(press(KeyCode::Char('m')), &mut state);
        assert!(state.mode.is_normal());
        assert_eq!(state.status.as_ref().map(|s| s.level), Some(StatusLevel::Warn));
    }

    #[test]
    fn commit_flow() {
        let mut state = state_with(vec![worktree_session("feat/a")], None);
        handle_key(press(KeyCode::Char('c')), &mut state);
        handle_key(press(KeyCode::Char('z')), &mut state);
        assert!(matches!(state.mode, Mode::SelectCommitType { .. }), "unknown type key is ignored");
        handle_key(press(KeyCode::Char('x')), &mut state);
        assert!(matches!(state.mode, Mode::ComposeCommit { commit_type: "fix", .. }));

        assert_eq!(handle_key(press(KeyCode::Enter), &mut state), KeyAction::Continue);
        assert!(state.input_error.is_some());

        typed(&mut state, "handle empty token");
        handle_key(press(KeyCode::Esc), &mut state);
        assert!(matches!(state.mode, Mode::SelectCommitType { .. }));
        handle_key(press(KeyCode::Char('f')), &mut state);
        typed(&mut state, "login form");
        assert_eq!(
            handle_key(press(KeyCode::Enter), &mut state),
            KeyAction::Dispatch(Command::Commit {
                path: "/repo/.claude/worktrees/feat-a".into(),
                message: "feat: login form".into(),
            })
        );
    }

    #[test]
    fn delete_guards_main_worktree() {
        let mut state = state_with(vec![session("main", "/repo"), worktree_session("feat/a")], None);
        handle_key(press(KeyCode::Char('d')), &mut state);
        assert!(state.mode.is_normal());

        handle_key(press(KeyCode::Down), &mut state);
        handle_key(press(KeyCode::Char('d')), &mut state);
        assert!(matches!(state.mode, Mode::ConfirmDelete { .. }));
        assert_eq!(
            handle_key(press(KeyCode::Char('y')), &mut state),
            KeyAction::Dispatch(Command::DeleteWorktree {
                path: "/repo/.claude/worktrees/feat-a".into(),
                branch: "feat/a".into(),
            })
        );
    }

    #[test]
    fn enter_attaches_selected_session() {
        let mut state = state_with(vec![worktree_session("feat/a")], None);
        assert_eq!(
            handle_key(press(KeyCode::Enter), &mut state),
            KeyAction::Dispatch(Command::EnsureAndAttach {
                slug: "feat-a".into(),
                path: "/repo/.claude/worktrees/feat-a".into(),
            })
        );
    }

    #[test]
    fn fatal_screen_accepts_only_retry_and_quit() {
        let mut state = state_with(vec![worktree_session("feat/a")], None);
        state.fatal = Some("broken".into());
        assert_eq!(handle_key(press(KeyCode::Char('n')), &mut state), KeyAction::Continue);
        assert!(state.mode.is_normal());
        assert_eq!(handle_key(press(KeyCode::Char('r')), &mut state), KeyAction::Dispatch(Command::Refresh { cycle: 2 }));
        assert_eq!(handle_key(press(KeyCode::Char('q')), &mut state), KeyAction::Quit);
    }

    #[test]
    fn ctrl_c_quits_from_any_mode() {
        let mut state = state_with(Vec::new(), None);
        handle_key(press(KeyCode::Char('n')), &mut state);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key(ctrl_c, &mut state), KeyAction::Quit);
    }
}
