//! User configuration for deckard.
//!
//! Read once at startup from `~/.config/deckard/config.toml`. Every field has
//! a default, so a missing file, a missing key, or a malformed file all yield
//! a working configuration; only the last one is worth a warning.

use std::path::PathBuf;
use std::time::Duration;

use deckard_core::forge::ForgeTimeouts;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Built-in theme name, see [`crate::theme::Theme::from_name`].
    pub theme: String,
    /// Private tmux socket name (`tmux -L`).
    pub tmux_socket: String,
    /// Program and arguments started in every new session.
    pub agent_command: Vec<String>,
    /// Directory, relative to the repository root, new worktrees go in.
    pub worktree_dir: String,
    pub idle_sample_ms: u64,
    pub fetch_timeout_secs: u64,
    pub create_timeout_secs: u64,
    pub update_timeout_secs: u64,
    /// How long info and warning footers stay up.
    pub status_clear_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "catppuccin-mocha".to_owned(),
            tmux_socket: "deckard".to_owned(),
            agent_command: vec!["claude".to_owned(), "--dangerously-skip-permissions".to_owned()],
            worktree_dir: ".claude/worktrees".to_owned(),
            idle_sample_ms: 300,
            fetch_timeout_secs: 10,
            create_timeout_secs: 30,
            update_timeout_secs: 15,
            status_clear_secs: 3,
        }
    }
}

impl Config {
    pub fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_sample_ms)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_clear_secs)
    }

    pub fn forge_timeouts(&self) -> ForgeTimeouts {
        ForgeTimeouts {
            fetch: Duration::from_secs(self.fetch_timeout_secs),
            create: Duration::from_secs(self.create_timeout_secs),
            update: Duration::from_secs(self.update_timeout_secs),
        }
    }

    /// Where the generated tmux config is written.
    pub fn tmux_conf_path(&self) -> PathBuf {
        config_dir().join("tmux.conf")
    }

    /// Parses `raw`, falling back to defaults on malformed input.
    pub fn parse(raw: &str) -> Self {
        match toml::from_str(raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "config parse error, using defaults");
                Self::default()
            }
        }
    }

    /// Loads the config file, or the defaults when there is none.
    pub fn load() -> Self {
        let path = config_path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => Self::parse(&raw),
            Err(_) => Self::default(),
        }
    }
}

/// `$XDG_CONFIG_HOME/deckard`, falling back to `~/.config/deckard`.
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("deckard")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}
