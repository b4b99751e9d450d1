//! Detail pane (right): the selected session and its review.

use deckard_core::types::{PipelineStatus, Review, ReviewState, Session};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};

use super::layout::panel_block;
use crate::app::AppState;
use crate::theme::Theme;

/// Glyph and label for a pipeline status.
pub fn pipeline_label(status: PipelineStatus) -> &'static str {
    match status {
        PipelineStatus::Success => "◆ PASSED",
        PipelineStatus::Failed => "✕ FAILED",
        PipelineStatus::Running => "~ RUNNING",
        PipelineStatus::Pending => "◇ PENDING",
        PipelineStatus::Canceled => "· CANCELED",
        PipelineStatus::Skipped => "· SKIPPED",
        PipelineStatus::None => "─",
    }
}

fn row<'a>(label: &'static str, value: Span<'a>, theme: &Theme) -> Line<'a> {
    Line::from(vec![Span::styled(format!("{label:<9}"), Style::default().fg(theme.dim)), value])
}

fn colored<'a>(text: impl Into<std::borrow::Cow<'a, str>>, color: Color) -> Span<'a> {
    Span::styled(text, Style::default().fg(color))
}

fn session_lines<'a>(session: &'a Session, theme: &Theme) -> Vec<Line<'a>> {
    let status = if session.needs_input {
        colored("▲ INPUT REQ", theme.warn)
    } else if session.terminal_running {
        colored("◆ ACTIVE", theme.ok)
    } else {
        colored("· IDLE", theme.dim)
    };
    vec![
        Line::from(Span::styled(
            session.slug.to_uppercase(),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        row("BRANCH", Span::raw(session.branch.as_str()), theme),
        row("PATH", Span::raw(session.path.to_string_lossy()), theme),
        row("STATUS", status, theme),
        Line::default(),
    ]
}

fn review_lines<'a>(review: &'a Review, theme: &Theme) -> Vec<Line<'a>> {
    let inactive = review.state.is_inactive();
    let title_color = if inactive { theme.dim } else { theme.text };
    let state = match review.state {
        ReviewState::Merged => colored("MERGED", theme.dim),
        ReviewState::Closed => colored("CLOSED", theme.dim),
        ReviewState::Open if review.draft => colored("DRAFT", theme.dim),
        ReviewState::Open => colored("OPEN", theme.ok),
    };

    let mut lines = vec![
        row(
            "REVIEW",
            Span::raw(format!("{}{}", review.forge_kind.number_prefix(), review.number)),
            theme,
        ),
        Line::from(colored(format!("         {}", review.title), title_color)),
        row("STATE", state, theme),
        row(
            "PIPELINE",
            colored(pipeline_label(review.pipeline_status), theme.pipeline(review.pipeline_status)),
            theme,
        ),
    ];
    if review.has_unresolved_threads {
        lines.push(row("THREADS", colored("▲ UNRESOLVED", theme.warn), theme));
    } else if review.pipeline_status != PipelineStatus::None {
        lines.push(row("THREADS", colored("◆ RESOLVED", theme.ok), theme));
    }
    if review.state == ReviewState::Merged {
        lines.push(Line::default());
        lines.push(Line::from(colored("◆ merged, safe to clean up", theme.ok)));
    }
    lines
}

pub fn render_detail(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let block = panel_block(" Detail ", false, theme);
    let Some(session) = state.selected() else {
        frame.render_widget(
            Paragraph::new(Line::from(colored("NO SESSIONS FOUND", theme.dim))).block(block),
            area,
        );
        return;
    };

    let mut lines = session_lines(session, theme);
    lines.push(Line::from(colored("─── REVIEW ───", theme.dim)));
    lines.push(Line::default());
    match &session.review {
        Some(review) => lines.extend(review_lines(review, theme)),
        None => {
            lines.push(Line::from(colored("NO REVIEW FOUND", theme.dim)));
            if state.has_forge() {
                lines.push(Line::from(colored("press m to create one", theme.dim)));
            }
        }
    }
    if session.terminal_running {
        lines.push(Line::default());
        lines.push(Line::from(colored("CTRL+]  detach without stopping the agent", theme.dim)));
    }

    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}
