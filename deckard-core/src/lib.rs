//! Session orchestration core for deckard.
//!
//! Everything here is UI-free: the session/review model, the forge
//! abstraction over `gh` and `glab`, the tmux liveness probe, the git
//! worktree source, and the concurrent enrichment pipeline that joins them.
//! The `deckard` binary owns the event loop and state machine on top.

pub mod enrich;
pub mod error;
pub mod forge;
pub mod git;
pub mod mux;
pub mod process;
pub mod types;

pub use error::{CoreError, Result};
