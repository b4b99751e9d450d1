//! Screen layout for deckard.
//!
//! Pure layout arithmetic plus the shared chrome (panel borders, status bar,
//! help line). Called inside `terminal.draw()` on every render, so every frame
//! reflects the current terminal size.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect, Spacing},
    style::{Modifier, Style},
    symbols::merge::MergeStrategy,
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph},
};

use crate::app::{AppState, Mode, StatusLevel};
use crate::theme::Theme;

/// Returns `[list, detail, status_bar, help_line]` for the current frame.
///
/// The session list takes a third of the width, at least 28 columns. Below
/// 60 columns the detail pane collapses and the list fills the width.
pub fn compute_layout(area: Rect) -> [Rect; 4] {
    let [main_area, status_bar, help_line] = area.layout(&Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ]));

    let horizontal = if area.width >= 60 {
        Layout::horizontal([Constraint::Length((area.width / 3).max(28)), Constraint::Fill(1)])
            .spacing(Spacing::Overlap(1))
    } else {
        Layout::horizontal([Constraint::Fill(1), Constraint::Length(0)])
    };
    let [list, detail] = main_area.layout(&horizontal);

    [list, detail, status_bar, help_line]
}

/// Builds a bordered `Block` for a panel, thick when active.
pub fn panel_block<'a>(title: &'a str, is_active: bool, theme: &'a Theme) -> Block<'a> {
    let border_style = if is_active {
        Style::default().fg(theme.border_active)
    } else {
        Style::default().fg(theme.border_inactive)
    };
    let border_type = if is_active { BorderType::Thick } else { BorderType::Plain };

    Block::bordered()
        .title(title)
        .border_type(border_type)
        .border_style(border_style)
        .merge_borders(MergeStrategy::Fuzzy)
}

fn mode_label(mode: &Mode) -> &'static str {
    match mode {
        Mode::Normal => " NORMAL ",
        Mode::NewSession { .. } => " NEW ",
        Mode::SelectCommitType { .. } | Mode::ComposeCommit { .. } => " COMMIT ",
        Mode::ConfirmDelete { .. } => " DELETE ",
        Mode::CreateReview { .. } | Mode::ManageReview { .. } => " REVIEW ",
    }
}

/// Mode indicator, repository summary and the current notification.
pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let mode_span = Span::styled(
        mode_label(&state.mode),
        Style::default().fg(theme.border_active).add_modifier(Modifier::BOLD),
    );
    let mut spans = vec![mode_span];

    if let Some(ctx) = &state.context {
        let forge = ctx.forge.map_or("no forge".to_owned(), |f| f.to_string());
        spans.push(Span::raw(format!(" {} sessions · base {} · {forge} ", state.sessions.len(), ctx.default_branch)));
    }

    if let Some(status) = &state.status {
        let color = match status.level {
            StatusLevel::Info => theme.ok,
            StatusLevel::Warn => theme.warn,
            StatusLevel::Error => theme.error,
        };
        spans.push(Span::styled(format!(" {}", status.text), Style::default().fg(color)));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(theme.status_bar_bg).fg(theme.status_bar_fg)),
        area,
    );
}

/// Key hints for the current mode.
pub fn help_text(state: &AppState) -> &'static str {
    if state.fatal.is_some() {
        return "r retry · q quit";
    }
    match state.mode {
        Mode::Normal => {
            "enter attach · n new · c commit · p push · m review · o open · d delete · r refresh · q quit"
        }
        Mode::NewSession { .. } => "enter create · esc cancel",
        Mode::SelectCommitType { .. } => "type key select · esc cancel",
        Mode::ComposeCommit { .. } => "enter commit · esc back",
        Mode::ConfirmDelete { .. } => "y confirm · n cancel",
        Mode::CreateReview { .. } => "tab next field · space toggle draft · enter create · esc cancel",
        Mode::ManageReview { .. } => "p ready · d draft · o open · esc close",
    }
}

pub fn render_help_line(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    frame.render_widget(
        Paragraph::new(help_text(state)).style(Style::default().fg(theme.dim)),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_terminal_collapses_detail() {
        let [list, detail, status, help] = compute_layout(Rect::new(0, 0, 50, 20));
        assert_eq!(list.width, 50);
        assert_eq!(detail.width, 0);
        assert_eq!(status.height, 1);
        assert_eq!(help.y, 19);
    }

    #[test]
    fn wide_terminal_splits_list_and_detail() {
        let [list, detail, ..] = compute_layout(Rect::new(0, 0, 120, 30));
        assert_eq!(list.width, 40);
        assert!(detail.width > list.width);
        assert_eq!(list.height, 28);
    }
}
