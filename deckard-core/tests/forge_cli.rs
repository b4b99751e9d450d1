//! Forge backends driven through a scripted runner.

mod common;

use std::path::Path;

use common::StubRunner;
use deckard_core::forge::{self, CreateReviewOpts, Forge, ForgeTimeouts, GitHub, GitLab, UpdateReviewOpts};
use deckard_core::process::CommandOutput;
use deckard_core::types::{ForgeKind, PipelineStatus, ReviewState};
use deckard_core::CoreError;

fn opts(draft: bool) -> CreateReviewOpts {
    CreateReviewOpts {
        title: "Add login".into(),
        base_branch: "main".into(),
        head_branch: "feat/login".into(),
        draft,
        workdir: "/repo/.claude/worktrees/feat-login".into(),
    }
}

#[tokio::test]
async fn github_fetch_prefers_open_pr() {
    let runner = StubRunner::new(|_| {
        Ok(CommandOutput::ok(
            r#"[{"number": 2, "state": "MERGED", "title": "old"},
                {"number": 5, "state": "OPEN", "title": "new", "statusCheckRollup": "PENDING"}]"#,
        ))
    });
    let gh = GitHub::new(runner.clone(), Path::new("/repo"), ForgeTimeouts::default());

    let review = gh.fetch_review("feat/login").await.unwrap();
    assert_eq!(review.number, 5);
    assert_eq!(review.pipeline_status, PipelineStatus::Pending);

    let call = &runner.calls()[0];
    assert_eq!(call.program, "gh");
    assert!(call.args_start_with(&["pr", "list", "--head", "feat/login", "--state", "all"]));
    assert_eq!(call.timeout, ForgeTimeouts::default().fetch);
}

#[tokio::test]
async fn github_fetch_absorbs_failures() {
    let missing = StubRunner::new(|_| Err(std::io::Error::other("gh: not found").into()));
    let gh = GitHub::new(missing, Path::new("/repo"), ForgeTimeouts::default());
    assert!(gh.fetch_review("b").await.is_none());

    let garbage = StubRunner::new(|_| Ok(CommandOutput::ok("not json")));
    let gh = GitHub::new(garbage, Path::new("/repo"), ForgeTimeouts::default());
    assert!(gh.fetch_review("b").await.is_none());

    let timeout = StubRunner::new(|inv| {
        Err(CoreError::Timeout { program: inv.program.clone(), after: inv.timeout })
    });
    let gh = GitHub::new(timeout, Path::new("/repo"), ForgeTimeouts::default());
    assert!(gh.fetch_review("b").await.is_none());
}

#[tokio::test]
async fn github_create_and_update_arguments() {
    let runner = StubRunner::succeeding();
    let gh = GitHub::new(runner.clone(), Path::new("/repo"), ForgeTimeouts::default());

    gh.create_review(&opts(true)).await.unwrap();
    gh.update_review(5, &UpdateReviewOpts { draft: Some(false) }).await.unwrap();
    gh.update_review(5, &UpdateReviewOpts { draft: Some(true) }).await.unwrap();
    gh.update_review(5, &UpdateReviewOpts::default()).await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 3, "an empty update runs nothing");
    assert_eq!(
        calls[0].args,
        ["pr", "create", "--title", "Add login", "--base", "main", "--head", "feat/login", "--body", "", "--draft"]
    );
    assert_eq!(calls[0].cwd.as_deref(), Some(Path::new("/repo/.claude/worktrees/feat-login")));
    assert_eq!(calls[1].args, ["pr", "ready", "5"]);
    assert_eq!(calls[2].args, ["pr", "ready", "5", "--undo"]);
}

#[tokio::test]
async fn create_failure_carries_cli_message() {
    let runner = StubRunner::new(|_| Ok(CommandOutput::failed("a pull request already exists")));
    let gh = GitHub::new(runner, Path::new("/repo"), ForgeTimeouts::default());
    let err = gh.create_review(&opts(false)).await.unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[tokio::test]
async fn gitlab_fetch_and_mutations() {
    let runner = StubRunner::new(|inv| {
        if inv.args_start_with(&["mr", "list"]) {
            Ok(CommandOutput::ok(
                r#"[{"iid": 31, "state": "merged"},
                    {"iid": 40, "state": "opened", "draft": true,
                     "pipeline": {"status": "manual"}, "blocking_discussions_resolved": false}]"#,
            ))
        } else {
            Ok(CommandOutput::ok(""))
        }
    });
    let gl = GitLab::new(runner.clone(), Path::new("/repo"), ForgeTimeouts::default());

    let review = gl.fetch_review("feat/login").await.unwrap();
    assert_eq!(review.number, 40);
    assert_eq!(review.state, ReviewState::Open);
    assert_eq!(review.pipeline_status, PipelineStatus::Pending);
    assert!(review.has_unresolved_threads);
    assert_eq!(review.forge_kind, ForgeKind::GitLab);

    gl.create_review(&opts(false)).await.unwrap();
    gl.update_review(40, &UpdateReviewOpts { draft: Some(false) }).await.unwrap();

    let calls = runner.calls();
    assert_eq!(calls[0].args, ["mr", "list", "--source-branch", "feat/login", "-F", "json"]);
    assert_eq!(
        calls[1].args,
        ["mr", "create", "--title", "Add login", "--target-branch", "main", "--source-branch", "feat/login", "--yes"]
    );
    assert_eq!(calls[2].args, ["mr", "update", "40", "--ready"]);
}

#[tokio::test]
async fn detect_by_remote_then_by_probe() {
    let runner = StubRunner::succeeding();
    let found = forge::detect(Path::new("/repo"), Some("git@github.com:a/b.git"), runner.clone(), ForgeTimeouts::default())
        .await
        .unwrap();
    assert_eq!(found.kind(), ForgeKind::GitHub);
    assert!(runner.calls().is_empty());

    let found = forge::detect(Path::new("/repo"), Some("ssh://git.corp/a.git"), runner.clone(), ForgeTimeouts::default())
        .await
        .unwrap();
    assert_eq!(found.kind(), ForgeKind::GitLab);
    assert!(runner.calls()[0].args_start_with(&["repo", "view"]));

    let refusing = StubRunner::new(|_| Ok(CommandOutput::failed("not a gitlab repo")));
    assert!(forge::detect(Path::new("/repo"), Some("ssh://git.corp/a.git"), refusing, ForgeTimeouts::default())
        .await
        .is_none());
    assert!(forge::detect(Path::new("/repo"), None, StubRunner::succeeding(), ForgeTimeouts::default())
        .await
        .is_none());
}
