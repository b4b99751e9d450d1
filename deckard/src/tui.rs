//! Terminal lifecycle management for deckard.
//!
//! The dashboard renders to stderr so that stdout stays free for the attached
//! tmux client and for shell pipelines. Attaching temporarily gives the
//! terminal back: [`suspend`] undoes [`init_tui`] and [`resume`] redoes it.

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use signal_hook::consts::SIGTERM;
use signal_hook::flag::register;
use std::io::{stderr, BufWriter, Stderr};
use std::panic;
use std::sync::{atomic::AtomicBool, Arc};
use tracing::warn;

/// CrosstermBackend over a buffered stderr writer.
pub type Tui = Terminal<CrosstermBackend<BufWriter<Stderr>>>;

/// Enables raw mode, enters the alternate screen and builds the terminal.
/// Call [`restore_tui`] at every exit path.
pub fn init_tui() -> std::io::Result<Tui> {
    let mut out = BufWriter::new(stderr());
    enable_raw_mode()?;
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    Terminal::new(CrosstermBackend::new(out))
}

/// Restores the terminal to its pre-TUI state. Idempotent; ratatui does not
/// restore on `Drop`, so this also runs from the panic hook.
pub fn restore_tui() -> std::io::Result<()> {
    disable_raw_mode()?;
    execute!(stderr(), LeaveAlternateScreen, DisableMouseCapture)?;
    Ok(())
}

/// Hands the terminal to a child process.
pub fn suspend(terminal: &mut Tui) -> std::io::Result<()> {
    terminal.show_cursor()?;
    restore_tui()
}

/// Takes the terminal back after a child process exited.
///
/// The child drew over the alternate screen buffer, so the next frame is
/// forced to a full redraw.
pub fn resume(terminal: &mut Tui) -> std::io::Result<()> {
    enable_raw_mode()?;
    execute!(terminal.backend_mut(), EnterAlternateScreen, EnableMouseCapture)?;
    terminal.hide_cursor()?;
    terminal.clear()
}

/// Installs a panic hook that restores the terminal before the panic message
/// prints. Must be called before [`init_tui`]; chains onto the previous hook.
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_tui();
        original_hook(panic_info);
    }));
}

/// Returns a flag that flips to `true` on SIGTERM, polled by the event loop.
///
/// If the handler cannot be registered the flag simply never flips; the
/// dashboard still quits on `q`.
pub fn register_sigterm() -> Arc<AtomicBool> {
    let term = Arc::new(AtomicBool::new(false));
    if let Err(err) = register(SIGTERM, Arc::clone(&term)) {
        warn!(error = %err, "could not register SIGTERM handler");
    }
    term
}
