//! Modal dialogs and the fatal screen.
//!
//! Each modal is drawn centred over the panels: `Clear` erases the area first,
//! then a bordered `Paragraph` is rendered on top, all inside the same
//! `terminal.draw()` closure.

use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::app::{AppState, Mode, ReviewField, ReviewForm, COMMIT_TYPES};
use crate::theme::Theme;

/// Renders the modal for the current mode, if any.
pub fn render_modal(frame: &mut Frame, state: &AppState, theme: &Theme) {
    let (title, mut lines) = match &state.mode {
        Mode::Normal => return,
        Mode::NewSession { branch } => (
            " New session ",
            vec![
                dim("BRANCH NAME", theme),
                input_line(branch, true, theme),
                Line::default(),
                dim("creates a worktree and starts the agent in it", theme),
            ],
        ),
        Mode::SelectCommitType { target } => {
            let mut lines = vec![dim(&format!("COMMIT TYPE FOR {}", target.slug), theme), Line::default()];
            lines.extend(COMMIT_TYPES.iter().map(|(key, name)| {
                Line::from(vec![
                    Span::styled(format!("  {key}  "), Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
                    Span::raw(*name),
                ])
            }));
            (" Commit ", lines)
        }
        Mode::ComposeCommit { commit_type, message, .. } => (
            " Commit ",
            vec![
                dim("MESSAGE", theme),
                Line::from(vec![
                    Span::styled(format!("{commit_type}: "), Style::default().fg(theme.accent)),
                    Span::raw(message.as_str()),
                    Span::styled("▏", Style::default().fg(theme.border_active)),
                ]),
            ],
        ),
        Mode::ConfirmDelete { target } => (
            " Delete worktree ",
            vec![
                Line::from(format!("Remove {} and its worktree?", target.slug)),
                dim(&target.path.to_string_lossy(), theme),
                Line::default(),
                dim("the branch is kept if it has unmerged commits", theme),
            ],
        ),
        Mode::CreateReview { form, .. } => (" Create review ", review_form_lines(form, theme)),
        Mode::ManageReview { review, .. } => (
            " Review ",
            vec![
                Line::from(format!("{}{}  {}", review.forge_kind.number_prefix(), review.number, review.title)),
                dim(if review.draft { "currently a draft" } else { "currently ready for review" }, theme),
                Line::default(),
                dim("p mark ready · d mark draft · o open in browser", theme),
            ],
        ),
    };

    if let Some(error) = &state.input_error {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(error.as_str(), Style::default().fg(theme.error))));
    }
    if state.busy {
        lines.push(Line::default());
        lines.push(dim("working…", theme));
    }

    let area = modal_area(frame.area(), lines.len() as u16 + 2);
    frame.render_widget(Clear, area);
    let block = Block::bordered()
        .title(title)
        .border_style(Style::default().fg(theme.border_active));
    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

/// Whole-screen error with retry instructions.
pub fn render_fatal(frame: &mut Frame, message: &str, theme: &Theme) {
    let lines = vec![
        Line::from(Span::styled("ERR", Style::default().fg(theme.error).add_modifier(Modifier::BOLD))),
        Line::default(),
        Line::from(message),
        Line::default(),
        dim("Press r to retry, q to quit.", theme),
    ];
    let area = frame.area();
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::bordered().border_style(Style::default().fg(theme.error)))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn review_form_lines<'a>(form: &'a ReviewForm, theme: &Theme) -> Vec<Line<'a>> {
    let checkbox = if form.draft { "[x] draft" } else { "[ ] draft" };
    let draft_style = if form.focus == ReviewField::Draft {
        Style::default().fg(theme.border_active).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text)
    };
    vec![
        dim("TITLE", theme),
        input_line(&form.title, form.focus == ReviewField::Title, theme),
        Line::default(),
        dim("BASE BRANCH", theme),
        input_line(&form.base, form.focus == ReviewField::Base, theme),
        Line::default(),
        Line::from(Span::styled(checkbox, draft_style)),
    ]
}

fn dim<'a>(text: &str, theme: &Theme) -> Line<'a> {
    Line::from(Span::styled(text.to_owned(), Style::default().fg(theme.dim)))
}

fn input_line<'a>(value: &'a str, focused: bool, theme: &Theme) -> Line<'a> {
    let marker = if focused { "> " } else { "  " };
    let mut spans = vec![
        Span::styled(marker, Style::default().fg(theme.border_active)),
        Span::raw(value),
    ];
    if focused {
        spans.push(Span::styled("▏", Style::default().fg(theme.border_active)));
    }
    Line::from(spans)
}

/// A centred box `height` rows tall, at most 64 columns wide.
fn modal_area(area: Rect, height: u16) -> Rect {
    let width = area.width.saturating_sub(4).min(64);
    area.centered(Constraint::Length(width), Constraint::Length(height.min(area.height)))
}
