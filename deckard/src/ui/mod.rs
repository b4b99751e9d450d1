//! UI rendering for deckard.
//!
//! `render()` is the single entry point, called by the event loop's
//! `terminal.draw()` closure exactly once per `AppEvent::Render`.

mod detail;
pub mod keybindings;
mod layout;
mod modal;
mod session_list;

use ratatui::{Frame, style::Style, widgets::Block};

use crate::app::AppState;
use crate::theme::Theme;
use layout::{compute_layout, render_help_line, render_status_bar};

/// Renders one complete frame: session list, detail pane, status bar, help
/// line, and the active modal on top. A fatal error replaces everything.
pub fn render(frame: &mut Frame, state: &mut AppState, theme: &Theme) {
    frame.render_widget(Block::new().style(Style::default().bg(theme.background)), frame.area());

    if let Some(message) = &state.fatal {
        modal::render_fatal(frame, message, theme);
        return;
    }

    let [list, detail, status_bar, help_line] = compute_layout(frame.area());

    session_list::render_session_list(frame, list, state, theme);
    if detail.width > 0 {
        detail::render_detail(frame, detail, state, theme);
    }
    render_status_bar(frame, status_bar, state, theme);
    render_help_line(frame, help_line, state, theme);

    modal::render_modal(frame, state, theme);
}
