//! The enrichment pipeline: one concurrent refresh of liveness and review
//! data across every session.
//!
//! A cycle fans out one task per worktree on a [`JoinSet`] and only returns
//! once all of them have finished, so callers always publish a complete
//! fleet. Per-session failures never escape a task: a failed probe reads as
//! "not running", a failed forge query as "no review", and a task that dies
//! outright leaves its session bare.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::Result;
use crate::forge::Forge;
use crate::git::WorktreeSource;
use crate::mux::LivenessProbe;
use crate::types::{PipelineStatus, Review, Session, Worktree};

/// Derived attention flag.
///
/// When a review is attached its signal wins outright (failed pipeline or
/// unresolved threads); the idle heuristic is only consulted without one.
pub fn attention(idle: bool, review: Option<&Review>) -> bool {
    match review {
        Some(review) => {
            review.pipeline_status == PipelineStatus::Failed || review.has_unresolved_threads
        }
        None => idle,
    }
}

/// Joins worktree listing, liveness probing and forge lookups.
#[derive(Clone)]
pub struct Enricher {
    worktrees: Arc<dyn WorktreeSource>,
    probe: LivenessProbe,
    forge: Option<Arc<dyn Forge>>,
}

impl Enricher {
    pub fn new(
        worktrees: Arc<dyn WorktreeSource>,
        probe: LivenessProbe,
        forge: Option<Arc<dyn Forge>>,
    ) -> Self {
        Self { worktrees, probe, forge }
    }

    /// Lists the current worktrees and enriches all of them.
    ///
    /// Only the listing can fail; it is the one step without a sensible
    /// per-session fallback.
    pub async fn run_cycle(&self) -> Result<Vec<Session>> {
        let worktrees = self.worktrees.list().await?;
        Ok(self.enrich(worktrees).await)
    }

    /// Enriches `worktrees` concurrently, preserving their order.
    pub async fn enrich(&self, worktrees: Vec<Worktree>) -> Vec<Session> {
        let mut slots: Vec<Option<Session>> = vec![None; worktrees.len()];
        let mut fallback = worktrees.clone();
        let mut tasks = JoinSet::new();

        for (index, worktree) in worktrees.into_iter().enumerate() {
            let probe = self.probe.clone();
            let forge = self.forge.clone();
            tasks.spawn(async move { (index, enrich_one(probe, forge, worktree).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, session)) => slots[index] = Some(session),
                Err(err) => warn!(error = %err, "session enrichment task failed"),
            }
        }

        slots
            .into_iter()
            .zip(fallback.drain(..))
            .map(|(slot, worktree)| slot.unwrap_or_else(|| Session::bare(worktree)))
            .collect()
    }
}

async fn enrich_one(probe: LivenessProbe, forge: Option<Arc<dyn Forge>>, worktree: Worktree) -> Session {
    let liveness = async {
        if !probe.session_exists(&worktree.slug).await {
            return (false, false);
        }
        (true, probe.needs_input(&worktree.slug).await)
    };
    let review = async {
        match &forge {
            Some(forge) => forge.fetch_review(&worktree.branch).await,
            None => None,
        }
    };
    let ((terminal_running, idle), review) = tokio::join!(liveness, review);

    debug!(slug = %worktree.slug, terminal_running, idle, has_review = review.is_some(), "enriched session");
    Session {
        needs_input: attention(idle, review.as_ref()),
        terminal_running,
        review,
        ..Session::bare(worktree)
    }
}
