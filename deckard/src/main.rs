//! deckard — a terminal dashboard for parallel coding-agent sessions.
//!
//! Entry point for the `deckard` binary. Wires together logging and config,
//! the terminal lifecycle (`tui`), the unified event bus (`event`), the
//! background command dispatcher (`dispatch`), and rendering (`ui`).
//!
//! # Startup sequence (order matters)
//!
//! 1. `init_logging()` and `Config::load()` — file-only, safe before terminal init.
//! 2. `install_panic_hook()` — installed first so it is the innermost hook.
//! 3. `register_sigterm()` — returns `Arc<AtomicBool>` polled in the event loop.
//! 4. `init_tui()` — enters alternate screen and enables raw mode.
//! 5. Create event channel and `spawn_event_task()`.
//! 6. Dispatch `Bootstrap`; the list shows a loading marker until it lands.
//!
//! `restore_tui()` is called after the event loop exits (quit key, SIGTERM, or
//! channel close). Draw errors propagate out of the loop via `break` so the
//! restore is always reached.

mod app;
mod config;
mod dispatch;
mod event;
mod logging;
mod theme;
mod tui;
mod ui;

use std::collections::VecDeque;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use deckard_core::mux::AttachCommand;
use deckard_core::process::ProcessRunner;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use app::AppState;
use dispatch::{Command, Dispatcher, TaskOutcome};
use event::AppEvent;
use ui::keybindings::{handle_key, handle_mouse, KeyAction};

/// What the loop must do after routing a batch of commands.
enum Flow {
    Continue,
    Quit,
}

/// Sends commands to the dispatcher, except attach which needs the terminal.
///
/// Attaching suspends the TUI and stops the input task so the child owns the
/// tty, waits for the client to detach, then restores everything and folds
/// `AttachEnded` back into the state.
async fn route(
    commands: Vec<Command>,
    state: &mut AppState,
    dispatcher: &Dispatcher,
    terminal: &mut tui::Tui,
    input: &mut JoinHandle<()>,
    tx: &UnboundedSender<AppEvent>,
) -> std::io::Result<()> {
    let mut queue: VecDeque<Command> = commands.into();
    while let Some(command) = queue.pop_front() {
        match command {
            Command::Attach(attach) => {
                event::stop_event_task(input).await;
                tui::suspend(terminal)?;
                run_attach(&attach).await;
                tui::resume(terminal)?;
                *input = event::spawn_event_task(tx.clone());
                queue.extend(state.apply_outcome(TaskOutcome::AttachEnded));
            }
            command => dispatcher.dispatch(command),
        }
    }
    Ok(())
}

async fn run_attach(attach: &AttachCommand) {
    info!(program = %attach.program, args = ?attach.args, "attaching");
    match tokio::process::Command::new(&attach.program).args(&attach.args).status().await {
        Ok(status) if status.success() => info!("detached"),
        Ok(status) => warn!(%status, "attach exited unsuccessfully"),
        Err(err) => warn!(error = %err, "could not run attach"),
    }
}

fn key_flow(action: KeyAction) -> (Flow, Vec<Command>) {
    match action {
        KeyAction::Continue => (Flow::Continue, Vec::new()),
        KeyAction::Quit => (Flow::Quit, Vec::new()),
        KeyAction::Dispatch(command) => (Flow::Continue, vec![command]),
    }
}

#[tokio::main]
async fn main() -> std::io::Result<ExitCode> {
    // Step 0: logging and config — neither touches the terminal.
    let log_file = logging::init_logging();
    let config = config::Config::load();
    info!(log = ?log_file, theme = %config.theme, "deckard starting");
    let theme = theme::Theme::from_name(&config.theme);
    let mut state = AppState::new(config.status_ttl());

    // Step 1: panic hook installed first — innermost hook restores terminal.
    tui::install_panic_hook();

    // Step 2: SIGTERM flag — polled in the 50ms heartbeat arm below.
    let term_flag = tui::register_sigterm();

    // Step 3: enter alternate screen and raw mode.
    let mut terminal = tui::init_tui()?;

    // Step 4: event channel, input task, and the dispatcher sharing its sender.
    let handler = event::EventHandler::new();
    let tx = handler.tx.clone();
    let mut rx = handler.rx;
    let mut input = event::spawn_event_task(tx.clone());
    let start_dir = std::env::current_dir()?;
    let dispatcher = Dispatcher::new(tx.clone(), Arc::new(config), Arc::new(ProcessRunner), start_dir);

    // Step 5: resolve the repository in the background.
    dispatcher.dispatch(Command::Bootstrap);

    'event_loop: loop {
        tokio::select! {
            // Heartbeat: SIGTERM is checked at least every 50ms even when idle.
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
            maybe_event = rx.recv() => {
                let (flow, commands) = match maybe_event {
                    Some(AppEvent::Render) => {
                        // Exactly one draw() call per Render event — never elsewhere.
                        terminal.draw(|frame| ui::render(frame, &mut state, &theme))?;
                        (Flow::Continue, Vec::new())
                    }
                    Some(AppEvent::Key(key)) => key_flow(handle_key(key, &mut state)),
                    Some(AppEvent::Mouse(mouse)) => key_flow(handle_mouse(mouse, &mut state)),
                    // frame.area() picks up the new size on the next Render.
                    Some(AppEvent::Resize(cols, rows)) => {
                        debug!(cols, rows, "terminal resized");
                        (Flow::Continue, Vec::new())
                    }
                    Some(AppEvent::Tick) => {
                        state.tick(Instant::now());
                        (Flow::Continue, Vec::new())
                    }
                    Some(AppEvent::Task(outcome)) => (Flow::Continue, state.apply_outcome(outcome)),
                    None => (Flow::Quit, Vec::new()),
                };
                if let Flow::Quit = flow {
                    break 'event_loop;
                }
                route(commands, &mut state, &dispatcher, &mut terminal, &mut input, &tx).await?;
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
        }
    }

    event::stop_event_task(&mut input).await;
    tui::restore_tui()?;
    info!(code = state.exit_code(), "deckard exiting");
    Ok(ExitCode::from(state.exit_code()))
}
