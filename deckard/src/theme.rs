//! Color theme system for deckard.
//!
//! Two built-in themes are provided:
//!
//! - `dark` — ANSI 16 colors only, so it works on any terminal including
//!   256-color SSH sessions with no truecolor support.
//! - `catppuccin_mocha` — Catppuccin Mocha palette in RGB; requires truecolor.

use deckard_core::types::PipelineStatus;
use ratatui::style::Color;
use tracing::warn;

/// All color values used across deckard's UI surfaces.
#[derive(Debug, Clone)]
pub struct Theme {
    // Panel borders
    pub border_active: Color,
    pub border_inactive: Color,

    // Session list and detail pane
    /// Header text and the detail pane title.
    pub accent: Color,
    pub text: Color,
    /// Labels, merged/closed reviews and idle sessions.
    pub dim: Color,
    /// Background of the selected row.
    pub selection_bg: Color,

    // Signals
    /// Running sessions, passed pipelines, resolved threads.
    pub ok: Color,
    /// Attention marker and warnings.
    pub warn: Color,
    /// Failed pipelines and error lines.
    pub error: Color,
    /// Running or pending pipelines.
    pub busy: Color,

    // Status bar
    pub status_bar_bg: Color,
    pub status_bar_fg: Color,

    pub background: Color,
}

impl Theme {
    /// Returns the built-in dark theme using ANSI 16 colors.
    pub fn dark() -> Self {
        Self {
            border_active: Color::Cyan,
            border_inactive: Color::DarkGray,

            accent: Color::Cyan,
            text: Color::Reset,
            dim: Color::DarkGray,
            selection_bg: Color::DarkGray,

            ok: Color::Green,
            warn: Color::Yellow,
            error: Color::Red,
            busy: Color::Blue,

            status_bar_bg: Color::DarkGray,
            status_bar_fg: Color::White,

            background: Color::Reset,
        }
    }

    /// Returns the Catppuccin Mocha theme using RGB truecolor values.
    ///
    /// Palette source: <https://github.com/catppuccin/catppuccin> Mocha variant.
    pub fn catppuccin_mocha() -> Self {
        let green = Color::Rgb(166, 227, 161); // #a6e3a1
        let red = Color::Rgb(243, 139, 168); // #f38ba8
        let blue = Color::Rgb(137, 180, 250); // #89b4fa
        let teal = Color::Rgb(148, 226, 213); // #94e2d5
        let lavender = Color::Rgb(180, 190, 254); // #b4befe
        let overlay1 = Color::Rgb(127, 132, 156); // #7f849c
        let surface0 = Color::Rgb(49, 50, 68); // #313244
        let surface1 = Color::Rgb(69, 71, 90); // #45475a
        let base = Color::Rgb(30, 30, 46); // #1e1e2e
        let text = Color::Rgb(205, 214, 244); // #cdd6f4
        let peach = Color::Rgb(250, 179, 135); // #fab387

        Self {
            border_active: lavender,
            border_inactive: overlay1,

            accent: teal,
            text,
            dim: overlay1,
            selection_bg: surface0,

            ok: green,
            warn: peach,
            error: red,
            busy: blue,

            status_bar_bg: surface1,
            status_bar_fg: text,

            background: base,
        }
    }

    /// Resolves a theme name from config. Unknown names fall back to `dark()`
    /// so a typo never prevents startup.
    pub fn from_name(name: &str) -> Self {
        match name {
            "catppuccin-mocha" | "catppuccin_mocha" => Self::catppuccin_mocha(),
            "dark" => Self::dark(),
            other => {
                warn!(theme = other, "unknown theme, falling back to 'dark'");
                Self::dark()
            }
        }
    }

    pub fn pipeline(&self, status: PipelineStatus) -> Color {
        match status {
            PipelineStatus::Success => self.ok,
            PipelineStatus::Failed => self.error,
            PipelineStatus::Running | PipelineStatus::Pending => self.busy,
            PipelineStatus::Canceled | PipelineStatus::Skipped | PipelineStatus::None => self.dim,
        }
    }
}
