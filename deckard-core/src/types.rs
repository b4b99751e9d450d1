use std::fmt;
use std::path::PathBuf;

/// Which hosted forge a review lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeKind {
    GitHub,
    GitLab,
}

impl ForgeKind {
    /// Prefix used when displaying a review number: `#12` on GitHub, `!12` on GitLab.
    pub fn number_prefix(self) -> &'static str {
        match self {
            ForgeKind::GitHub => "#",
            ForgeKind::GitLab => "!",
        }
    }
}

impl fmt::Display for ForgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgeKind::GitHub => write!(f, "github"),
            ForgeKind::GitLab => write!(f, "gitlab"),
        }
    }
}

/// Normalised lifecycle state of a review request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Open,
    Merged,
    Closed,
}

impl ReviewState {
    /// Merged and closed reviews are rendered dimmed.
    pub fn is_inactive(self) -> bool {
        matches!(self, ReviewState::Merged | ReviewState::Closed)
    }
}

/// Normalised CI pipeline status shared by both forge backends.
///
/// `None` stands for "no pipeline information" (the empty string upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    Success,
    Failed,
    Running,
    Pending,
    Canceled,
    Skipped,
    #[default]
    None,
}

/// A pull/merge request projected onto the shared vocabulary.
///
/// Never mutated: every enrichment cycle fetches a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub number: u64,
    pub title: String,
    pub web_url: String,
    pub state: ReviewState,
    pub draft: bool,
    pub pipeline_status: PipelineStatus,
    pub has_unresolved_threads: bool,
    pub forge_kind: ForgeKind,
}

/// A worktree as reported by the worktree source, before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub path: PathBuf,
    pub branch: String,
    pub slug: String,
}

impl Worktree {
    /// Builds a worktree record, deriving the slug from `branch`.
    pub fn new(path: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        let branch = branch.into();
        let slug = branch_to_slug(&branch);
        Self { path: path.into(), branch, slug }
    }
}

/// One tracked unit of work: a worktree plus its live process and review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub path: PathBuf,
    pub branch: String,
    pub slug: String,
    /// Whether a tmux session named `slug` is alive.
    pub terminal_running: bool,
    /// Derived attention flag, see [`crate::enrich::attention`].
    pub needs_input: bool,
    pub review: Option<Review>,
}

impl Session {
    /// A session with no liveness or review data, as used when a probe fails.
    pub fn bare(worktree: Worktree) -> Self {
        Self {
            path: worktree.path,
            branch: worktree.branch,
            slug: worktree.slug,
            terminal_running: false,
            needs_input: false,
            review: None,
        }
    }
}

/// Normalises a branch name into a filesystem- and tmux-safe slug.
///
/// Lowercases and replaces `/` with `-`. Distinct branches may collide
/// (`Feat/x` and `feat-x`); uniqueness is assumed by callers.
pub fn branch_to_slug(branch: &str) -> String {
    if branch.is_empty() {
        return "unknown".to_owned();
    }
    branch.to_lowercase().replace('/', "-")
}

/// Derives a human title from a branch: `feat/add-login` → `Feat add login`.
pub fn branch_to_title(branch: &str) -> String {
    let words = branch.replace(['/', '-', '_'], " ");
    let words = words.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
