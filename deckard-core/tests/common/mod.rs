//! Scripted stand-ins for the external seams used by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deckard_core::forge::{CreateReviewOpts, Forge, UpdateReviewOpts};
use deckard_core::git::WorktreeSource;
use deckard_core::mux::{AttachCommand, Multiplexer};
use deckard_core::process::{CommandOutput, CommandRunner, Invocation};
use deckard_core::types::{ForgeKind, PipelineStatus, Review, ReviewState, Worktree};
use deckard_core::{CoreError, Result};

type Responder = dyn Fn(&Invocation) -> Result<CommandOutput> + Send + Sync;

/// Records every invocation and answers with a caller-supplied closure.
pub struct StubRunner {
    calls: Mutex<Vec<Invocation>>,
    respond: Box<Responder>,
}

impl StubRunner {
    pub fn new(respond: impl Fn(&Invocation) -> Result<CommandOutput> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), respond: Box::new(respond) })
    }

    /// Every command succeeds with empty output.
    pub fn succeeding() -> Arc<Self> {
        Self::new(|_| Ok(CommandOutput::ok(Vec::new())))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for StubRunner {
    async fn run(&self, invocation: Invocation) -> Result<CommandOutput> {
        let result = (self.respond)(&invocation);
        self.calls.lock().unwrap().push(invocation);
        result
    }
}

/// A multiplexer whose sessions and pane snapshots are scripted per slug.
#[derive(Default)]
pub struct FakeMux {
    pub alive: Mutex<Vec<String>>,
    /// Successive `sample` results per slug; the last one repeats.
    pub snapshots: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    pub sample_calls: AtomicUsize,
    pub ensure_calls: AtomicUsize,
}

impl FakeMux {
    pub fn with_alive(slugs: &[&str]) -> Arc<Self> {
        let mux = Self::default();
        *mux.alive.lock().unwrap() = slugs.iter().map(|s| s.to_string()).collect();
        Arc::new(mux)
    }

    pub fn script(&self, slug: &str, frames: &[&[u8]]) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(slug.to_owned(), frames.iter().map(|f| f.to_vec()).collect());
    }

    pub fn samples(&self) -> usize {
        self.sample_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Multiplexer for FakeMux {
    async fn exists(&self, slug: &str) -> bool {
        self.alive.lock().unwrap().iter().any(|s| s == slug)
    }

    async fn sample(&self, slug: &str) -> Vec<u8> {
        self.sample_calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self.snapshots.lock().unwrap();
        match snapshots.get_mut(slug) {
            Some(frames) if frames.len() > 1 => frames.remove(0),
            Some(frames) => frames.first().cloned().unwrap_or_default(),
            None => Vec::new(),
        }
    }

    async fn ensure(&self, slug: &str, _workdir: &Path) -> Result<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        let mut alive = self.alive.lock().unwrap();
        if !alive.iter().any(|s| s == slug) {
            alive.push(slug.to_owned());
        }
        Ok(())
    }

    fn attach_command(&self, slug: &str) -> AttachCommand {
        AttachCommand { program: "true".to_owned(), args: vec![slug.to_owned()] }
    }
}

/// How the fake forge answers for a branch.
#[derive(Clone)]
pub enum ForgeAnswer {
    Review(Review),
    Panic,
}

#[derive(Default)]
pub struct FakeForge {
    pub answers: Mutex<HashMap<String, ForgeAnswer>>,
    pub created: Mutex<Vec<CreateReviewOpts>>,
    pub updated: Mutex<Vec<(u64, UpdateReviewOpts)>>,
}

impl FakeForge {
    pub fn answer(&self, branch: &str, answer: ForgeAnswer) {
        self.answers.lock().unwrap().insert(branch.to_owned(), answer);
    }
}

#[async_trait]
impl Forge for FakeForge {
    fn kind(&self) -> ForgeKind {
        ForgeKind::GitHub
    }

    async fn fetch_review(&self, branch: &str) -> Option<Review> {
        let answer = self.answers.lock().unwrap().get(branch).cloned();
        match answer {
            Some(ForgeAnswer::Review(review)) => Some(review),
            Some(ForgeAnswer::Panic) => panic!("forge exploded for {branch}"),
            None => None,
        }
    }

    async fn create_review(&self, opts: &CreateReviewOpts) -> Result<()> {
        self.created.lock().unwrap().push(opts.clone());
        Ok(())
    }

    async fn update_review(&self, number: u64, opts: &UpdateReviewOpts) -> Result<()> {
        self.updated.lock().unwrap().push((number, *opts));
        Ok(())
    }
}

/// A fixed worktree list, or a listing failure.
pub struct FakeWorktrees {
    pub listing: Mutex<Option<Vec<Worktree>>>,
}

impl FakeWorktrees {
    pub fn new(worktrees: Vec<Worktree>) -> Arc<Self> {
        Arc::new(Self { listing: Mutex::new(Some(worktrees)) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { listing: Mutex::new(None) })
    }
}

#[async_trait]
impl WorktreeSource for FakeWorktrees {
    async fn list(&self) -> Result<Vec<Worktree>> {
        self.listing
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CoreError::CommandFailed { program: "git".into(), detail: "listing broke".into() })
    }

    async fn create(&self, branch: &str) -> Result<Worktree> {
        let worktree = Worktree::new(format!("/repo/.claude/worktrees/{branch}"), branch);
        if let Some(list) = self.listing.lock().unwrap().as_mut() {
            list.push(worktree.clone());
        }
        Ok(worktree)
    }

    async fn delete(&self, path: &Path, _branch: &str) -> Result<()> {
        if let Some(list) = self.listing.lock().unwrap().as_mut() {
            list.retain(|wt| wt.path != path);
        }
        Ok(())
    }
}

pub fn worktree(branch: &str) -> Worktree {
    Worktree::new(format!("/repo/.claude/worktrees/{}", branch.replace('/', "-")), branch)
}

pub fn review(number: u64, pipeline: PipelineStatus, unresolved: bool) -> Review {
    Review {
        number,
        title: format!("Review {number}"),
        web_url: format!("https://github.com/acme/widgets/pull/{number}"),
        state: ReviewState::Open,
        draft: false,
        pipeline_status: pipeline,
        has_unresolved_threads: unresolved,
        forge_kind: ForgeKind::GitHub,
    }
}
