use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{select_candidate, CreateReviewOpts, Forge, ForgeTimeouts, UpdateReviewOpts};
use crate::error::Result;
use crate::process::{CommandRunner, Invocation};
use crate::types::{ForgeKind, PipelineStatus, Review, ReviewState};

const GH: &str = "gh";
const LIST_FIELDS: &str = "number,title,state,url,isDraft,statusCheckRollup,reviewDecision";

/// GitHub backend driven through the `gh` CLI.
pub struct GitHub {
    runner: Arc<dyn CommandRunner>,
    repo_root: PathBuf,
    timeouts: ForgeTimeouts,
}

impl GitHub {
    pub fn new(runner: Arc<dyn CommandRunner>, repo_root: &Path, timeouts: ForgeTimeouts) -> Self {
        Self { runner, repo_root: repo_root.to_path_buf(), timeouts }
    }
}

/// The subset of `gh pr list --json` we read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPr {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    is_draft: bool,
    #[serde(default)]
    status_check_rollup: Option<Rollup>,
    #[serde(default)]
    review_decision: Option<String>,
}

/// Older `gh` releases emit the rollup state as a string; current ones emit
/// the list of individual checks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Rollup {
    State(String),
    Checks(Vec<GhCheck>),
}

/// Either a check run (`status` + `conclusion`) or a commit status context (`state`).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GhCheck {
    status: Option<String>,
    conclusion: Option<String>,
    state: Option<String>,
}

fn map_state(raw: &str) -> ReviewState {
    match raw {
        "MERGED" => ReviewState::Merged,
        "CLOSED" => ReviewState::Closed,
        _ => ReviewState::Open,
    }
}

/// Maps a rollup state string onto the shared vocabulary.
fn map_rollup_state(raw: &str) -> PipelineStatus {
    match raw {
        "" => PipelineStatus::None,
        "SUCCESS" => PipelineStatus::Success,
        "FAILURE" | "ERROR" => PipelineStatus::Failed,
        "PENDING" | "EXPECTED" | "STALE" => PipelineStatus::Pending,
        _ => PipelineStatus::Pending,
    }
}

fn map_check(check: &GhCheck) -> PipelineStatus {
    if let Some(state) = check.state.as_deref() {
        return map_rollup_state(state);
    }
    match (check.status.as_deref(), check.conclusion.as_deref()) {
        (Some("COMPLETED"), Some(conclusion)) => match conclusion {
            "SUCCESS" | "NEUTRAL" => PipelineStatus::Success,
            "SKIPPED" => PipelineStatus::Skipped,
            "CANCELLED" => PipelineStatus::Canceled,
            "FAILURE" | "TIMED_OUT" | "ACTION_REQUIRED" | "STARTUP_FAILURE" => PipelineStatus::Failed,
            _ => PipelineStatus::Pending,
        },
        (Some("IN_PROGRESS"), _) => PipelineStatus::Running,
        _ => PipelineStatus::Pending,
    }
}

/// Folds individual checks into one status. Failure dominates, then activity.
fn fold_checks(checks: &[GhCheck]) -> PipelineStatus {
    if checks.is_empty() {
        return PipelineStatus::None;
    }
    let statuses: Vec<PipelineStatus> = checks.iter().map(map_check).collect();
    let any = |s: PipelineStatus| statuses.contains(&s);
    if any(PipelineStatus::Failed) {
        PipelineStatus::Failed
    } else if any(PipelineStatus::Running) {
        PipelineStatus::Running
    } else if any(PipelineStatus::Pending) {
        PipelineStatus::Pending
    } else if any(PipelineStatus::Canceled) {
        PipelineStatus::Canceled
    } else if statuses.iter().all(|s| *s == PipelineStatus::Skipped) {
        PipelineStatus::Skipped
    } else {
        PipelineStatus::Success
    }
}

fn map_pipeline(rollup: Option<&Rollup>) -> PipelineStatus {
    match rollup {
        None => PipelineStatus::None,
        Some(Rollup::State(state)) => map_rollup_state(state),
        Some(Rollup::Checks(checks)) => fold_checks(checks),
    }
}

/// Parses `gh pr list` output and projects the preferred candidate.
pub(crate) fn parse_pr_list(raw: &[u8]) -> Result<Option<Review>> {
    let prs: Vec<GhPr> = serde_json::from_slice(raw)?;
    let Some(pr) = select_candidate(prs, |pr| pr.state == "OPEN") else {
        return Ok(None);
    };
    let has_unresolved_threads = matches!(
        pr.review_decision.as_deref(),
        Some("CHANGES_REQUESTED") | Some("REVIEW_REQUIRED")
    );
    Ok(Some(Review {
        number: pr.number,
        title: pr.title,
        web_url: pr.url,
        state: map_state(&pr.state),
        draft: pr.is_draft,
        pipeline_status: map_pipeline(pr.status_check_rollup.as_ref()),
        has_unresolved_threads,
        forge_kind: ForgeKind::GitHub,
    }))
}

#[async_trait]
impl Forge for GitHub {
    fn kind(&self) -> ForgeKind {
        ForgeKind::GitHub
    }

    async fn fetch_review(&self, branch: &str) -> Option<Review> {
        let invocation = Invocation::new(
            GH,
            ["pr", "list", "--head", branch, "--state", "all", "--json", LIST_FIELDS],
        )
        .cwd(&self.repo_root)
        .timeout(self.timeouts.fetch);

        let stdout = match self.runner.run(invocation).await.and_then(|out| out.into_result(GH)) {
            Ok(stdout) => stdout,
            Err(err) => {
                debug!(branch, error = %err, "gh pr list failed");
                return None;
            }
        };
        parse_pr_list(&stdout).unwrap_or_else(|err| {
            debug!(branch, error = %err, "gh pr list returned malformed json");
            None
        })
    }

    async fn create_review(&self, opts: &CreateReviewOpts) -> Result<()> {
        let mut args = vec![
            "pr".to_owned(),
            "create".to_owned(),
            "--title".to_owned(),
            opts.title.clone(),
            "--base".to_owned(),
            opts.base_branch.clone(),
            "--head".to_owned(),
            opts.head_branch.clone(),
            "--body".to_owned(),
            String::new(),
        ];
        if opts.draft {
            args.push("--draft".to_owned());
        }
        let invocation = Invocation::new(GH, args).cwd(&opts.workdir).timeout(self.timeouts.create);
        self.runner.run(invocation).await?.into_result("gh pr create")?;
        Ok(())
    }

    async fn update_review(&self, number: u64, opts: &UpdateReviewOpts) -> Result<()> {
        let Some(draft) = opts.draft else {
            return Ok(());
        };
        let mut args = vec!["pr".to_owned(), "ready".to_owned(), number.to_string()];
        if draft {
            args.push("--undo".to_owned());
        }
        let invocation = Invocation::new(GH, args)
            .cwd(&self.repo_root)
            .timeout(self.timeouts.update);
        self.runner.run(invocation).await?.into_result("gh pr ready")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_pr_is_preferred_over_merged() {
        let raw = br#"[
            {"number": 7, "title": "old", "state": "MERGED", "url": "u7", "isDraft": false},
            {"number": 9, "title": "new", "state": "OPEN", "url": "u9", "isDraft": true,
             "statusCheckRollup": "FAILURE", "reviewDecision": "APPROVED"}
        ]"#;
        let review = parse_pr_list(raw).unwrap().unwrap();
        assert_eq!(review.number, 9);
        assert_eq!(review.state, ReviewState::Open);
        assert!(review.draft);
        assert_eq!(review.pipeline_status, PipelineStatus::Failed);
        assert!(!review.has_unresolved_threads);
        assert_eq!(review.forge_kind, ForgeKind::GitHub);
    }

    #[test]
    fn rollup_string_table() {
        assert_eq!(map_rollup_state("SUCCESS"), PipelineStatus::Success);
        assert_eq!(map_rollup_state("ERROR"), PipelineStatus::Failed);
        assert_eq!(map_rollup_state("EXPECTED"), PipelineStatus::Pending);
        assert_eq!(map_rollup_state("STALE"), PipelineStatus::Pending);
        assert_eq!(map_rollup_state("SOMETHING_NEW"), PipelineStatus::Pending);
        assert_eq!(map_rollup_state(""), PipelineStatus::None);
    }

    #[test]
    fn rollup_check_list_is_folded() {
        let raw = br#"[{"number": 1, "state": "OPEN", "statusCheckRollup": [
            {"status": "COMPLETED", "conclusion": "SUCCESS"},
            {"status": "IN_PROGRESS", "conclusion": ""},
            {"state": "SUCCESS"}
        ]}]"#;
        let review = parse_pr_list(raw).unwrap().unwrap();
        assert_eq!(review.pipeline_status, PipelineStatus::Running);

        let raw = br#"[{"number": 1, "state": "OPEN", "statusCheckRollup": [
            {"status": "COMPLETED", "conclusion": "SUCCESS"},
            {"status": "COMPLETED", "conclusion": "FAILURE"}
        ]}]"#;
        let review = parse_pr_list(raw).unwrap().unwrap();
        assert_eq!(review.pipeline_status, PipelineStatus::Failed);

        let raw = br#"[{"number": 1, "state": "OPEN", "statusCheckRollup": []}]"#;
        let review = parse_pr_list(raw).unwrap().unwrap();
        assert_eq!(review.pipeline_status, PipelineStatus::None);
    }

    #[test]
    fn changes_requested_counts_as_unresolved() {
        let raw = br#"[{"number": 3, "state": "OPEN", "reviewDecision": "CHANGES_REQUESTED"}]"#;
        assert!(parse_pr_list(raw).unwrap().unwrap().has_unresolved_threads);
    }

    #[test]
    fn empty_list_is_absent() {
        assert_eq!(parse_pr_list(b"[]").unwrap(), None);
    }
}
