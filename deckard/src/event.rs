//! Event bus for deckard.
//!
//! Terminal input, timer ticks and background-task results are normalised into
//! a single `AppEvent` enum and sent over a tokio unbounded MPSC channel. The
//! main loop receives from this channel and is the only place `AppState` is
//! mutated.
//!
//! Two independent intervals drive the render and logic cycles:
//! - **Render interval** (33 ms ≈ 30 FPS) triggers a `terminal.draw()` call.
//! - **Tick interval** (250 ms) advances the spinner and expires status lines.

use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind, MouseEvent};
use futures::{FutureExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::dispatch::TaskOutcome;

/// All events the application can receive from any source.
#[derive(Debug)]
pub enum AppEvent {
    /// A key press from the terminal (`KeyEventKind::Press` only).
    Key(KeyEvent),
    Mouse(MouseEvent),
    /// Terminal was resized to (columns, rows).
    Resize(u16, u16),
    Tick,
    Render,
    /// A dispatched command finished.
    Task(TaskOutcome),
}

/// Holds the sender and receiver ends of the unified event channel.
///
/// The sender (`tx`) is cloned into the input task and the dispatcher; the
/// receiver (`rx`) is owned by the main event loop.
pub struct EventHandler {
    pub tx: mpsc::UnboundedSender<AppEvent>,
    pub rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the task that reads terminal input and drives the two timers.
///
/// The returned handle is aborted before handing the terminal to an attached
/// session, so that this task does not compete with the child for stdin,
/// and a fresh task is spawned afterwards.
///
/// `reader.next().fuse()` keeps `select!` from polling a finished stream, and
/// the `Press` filter drops the release events some platforms synthesise.
pub fn spawn_event_task(tx: mpsc::UnboundedSender<AppEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick_interval = interval(Duration::from_millis(250));
        let mut render_interval = interval(Duration::from_millis(33));
        let mut reader = EventStream::new();

        loop {
            let tick_tick = tick_interval.tick();
            let render_tick = render_interval.tick();
            let crossterm_event = reader.next().fuse();

            let sent = tokio::select! {
                _ = tick_tick => tx.send(AppEvent::Tick),
                _ = render_tick => tx.send(AppEvent::Render),
                maybe_event = crossterm_event => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => tx.send(AppEvent::Key(key)),
                    Some(Ok(Event::Resize(w, h))) => tx.send(AppEvent::Resize(w, h)),
                    Some(Ok(Event::Mouse(mouse))) => tx.send(AppEvent::Mouse(mouse)),
                    _ => Ok(()),
                },
            };
            if sent.is_err() {
                break;
            }
        }
    })
}

/// Aborts the input task and waits until it has actually stopped, so its
/// `EventStream` no longer reads stdin when this returns.
pub async fn stop_event_task(handle: &mut JoinHandle<()>) {
    handle.abort();
    let _ = handle.await;
}
