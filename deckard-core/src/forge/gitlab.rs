use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{select_candidate, CreateReviewOpts, Forge, ForgeTimeouts, UpdateReviewOpts};
use crate::error::Result;
use crate::process::{CommandRunner, Invocation};
use crate::types::{ForgeKind, PipelineStatus, Review, ReviewState};

const GLAB: &str = "glab";

/// GitLab backend driven through the `glab` CLI.
pub struct GitLab {
    runner: Arc<dyn CommandRunner>,
    repo_root: PathBuf,
    timeouts: ForgeTimeouts,
}

impl GitLab {
    pub fn new(runner: Arc<dyn CommandRunner>, repo_root: &Path, timeouts: ForgeTimeouts) -> Self {
        Self { runner, repo_root: repo_root.to_path_buf(), timeouts }
    }
}

/// The subset of `glab mr list -F json` we read.
#[derive(Debug, Deserialize)]
struct GlabMr {
    iid: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    web_url: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    pipeline: Option<GlabPipeline>,
    /// `false` while blocking discussion threads are open.
    #[serde(default)]
    blocking_discussions_resolved: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GlabPipeline {
    #[serde(default)]
    status: String,
}

fn map_state(raw: &str) -> ReviewState {
    match raw {
        "merged" => ReviewState::Merged,
        "closed" | "locked" => ReviewState::Closed,
        _ => ReviewState::Open,
    }
}

/// GitLab pipeline statuses; the queue-like ones all collapse to `Pending`.
fn map_pipeline(raw: &str) -> PipelineStatus {
    match raw {
        "" => PipelineStatus::None,
        "success" => PipelineStatus::Success,
        "failed" => PipelineStatus::Failed,
        "running" => PipelineStatus::Running,
        "pending" | "waiting_for_resource" | "preparing" | "scheduled" | "created" | "manual" => {
            PipelineStatus::Pending
        }
        "canceled" => PipelineStatus::Canceled,
        "skipped" => PipelineStatus::Skipped,
        _ => PipelineStatus::Pending,
    }
}

/// Parses `glab mr list` output and projects the preferred candidate.
pub(crate) fn parse_mr_list(raw: &[u8]) -> Result<Option<Review>> {
    let mrs: Vec<GlabMr> = serde_json::from_slice(raw)?;
    let Some(mr) = select_candidate(mrs, |mr| mr.state == "opened") else {
        return Ok(None);
    };
    let pipeline_status = mr
        .pipeline
        .as_ref()
        .map(|p| map_pipeline(&p.status))
        .unwrap_or_default();
    Ok(Some(Review {
        number: mr.iid,
        title: mr.title,
        web_url: mr.web_url,
        state: map_state(&mr.state),
        draft: mr.draft,
        pipeline_status,
        has_unresolved_threads: mr.blocking_discussions_resolved == Some(false),
        forge_kind: ForgeKind::GitLab,
    }))
}

#[async_trait]
impl Forge for GitLab {
    fn kind(&self) -> ForgeKind {
        ForgeKind::GitLab
    }

    async fn fetch_review(&self, branch: &str) -> Option<Review> {
        let invocation = Invocation::new(GLAB, ["mr", "list", "--source-branch", branch, "-F", "json"])
            .cwd(&self.repo_root)
            .timeout(self.timeouts.fetch);

        let stdout = match self.runner.run(invocation).await.and_then(|out| out.into_result(GLAB)) {
            Ok(stdout) => stdout,
            Err(err) => {
                debug!(branch, error = %err, "glab mr list failed");
                return None;
            }
        };
        parse_mr_list(&stdout).unwrap_or_else(|err| {
            debug!(branch, error = %err, "glab mr list returned malformed json");
            None
        })
    }

    async fn create_review(&self, opts: &CreateReviewOpts) -> Result<()> {
        let mut args = vec![
            "mr".to_owned(),
            "create".to_owned(),
            "--title".to_owned(),
            opts.title.clone(),
            "--target-branch".to_owned(),
            opts.base_branch.clone(),
            "--source-branch".to_owned(),
            opts.head_branch.clone(),
            "--yes".to_owned(),
        ];
        if opts.draft {
            args.push("--draft".to_owned());
        }
        let invocation = Invocation::new(GLAB, args).cwd(&opts.workdir).timeout(self.timeouts.create);
        self.runner.run(invocation).await?.into_result("glab mr create")?;
        Ok(())
    }

    async fn update_review(&self, number: u64, opts: &UpdateReviewOpts) -> Result<()> {
        let Some(draft) = opts.draft else {
            return Ok(());
        };
        let flag = if draft { "--draft" } else { "--ready" };
        let invocation = Invocation::new(GLAB, ["mr".to_owned(), "update".to_owned(), number.to_string(), flag.to_owned()])
            .cwd(&self.repo_root)
            .timeout(self.timeouts.update);
        self.runner.run(invocation).await?.into_result("glab mr update")?;
        Ok(())
    }
}
