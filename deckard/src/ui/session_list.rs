//! Session list panel (left).

use deckard_core::types::Session;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
};

use super::layout::panel_block;
use crate::app::AppState;
use crate::theme::Theme;

pub const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// Leading glyph: `▲` needs attention, a spinner frame while the agent runs,
/// `·` when no session is alive.
pub fn indicator(session: &Session, spinner_frame: usize) -> &'static str {
    if session.needs_input {
        "▲"
    } else if session.terminal_running {
        SPINNER[spinner_frame % SPINNER.len()]
    } else {
        "·"
    }
}

fn item<'a>(session: &'a Session, spinner_frame: usize, theme: &Theme) -> ListItem<'a> {
    let glyph_color = if session.needs_input {
        theme.warn
    } else if session.terminal_running {
        theme.ok
    } else {
        theme.dim
    };
    let mut title = vec![
        Span::styled(indicator(session, spinner_frame), Style::default().fg(glyph_color)),
        Span::raw(" "),
        Span::styled(session.slug.as_str(), Style::default().fg(theme.text).add_modifier(Modifier::BOLD)),
    ];
    if let Some(review) = &session.review {
        let color = if review.state.is_inactive() { theme.dim } else { theme.pipeline(review.pipeline_status) };
        title.push(Span::styled(
            format!(" {}{}", review.forge_kind.number_prefix(), review.number),
            Style::default().fg(color),
        ));
    }
    let branch = Line::from(Span::styled(format!("  {}", session.branch), Style::default().fg(theme.dim)));
    ListItem::new(vec![Line::from(title), branch])
}

pub fn render_session_list(frame: &mut Frame, area: Rect, state: &mut AppState, theme: &Theme) {
    let title = if state.loading {
        format!(" Sessions {} ", SPINNER[state.spinner_frame % SPINNER.len()])
    } else {
        " Sessions ".to_owned()
    };
    let block = panel_block(&title, state.mode.is_normal(), theme);

    let items: Vec<ListItem> = state
        .sessions
        .iter()
        .map(|s| item(s, state.spinner_frame, theme))
        .collect();
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(theme.selection_bg));

    frame.render_stateful_widget(list, area, &mut state.list_state);
}
