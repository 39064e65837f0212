//! Merge engine: the resolve and octopus strategies.
//!
//! Both strategies unpack trees into the index and working tree with git's
//! read-tree rules ([`unpack`]), then hand whatever is left unmerged to an
//! [`UnmergedScanner`] which resolves each path through a [`PathResolver`].
//! The in-process resolver ([`ContentResolver`]) does the classic
//! merge-one-file case analysis and a line-level three-way merge
//! ([`content`]); [`ProgramResolver`] delegates to an external program.

pub mod content;
mod diff;
pub mod driver;
pub mod resolver;
pub mod scanner;
pub mod strategy;
pub mod unpack;

use bstr::BString;
use octo_hash::ObjectId;
use octo_repo::Config;

pub use resolver::{ConflictKind, ContentResolver, PathResolver, ProgramResolver, ResolveError, Side, Sides};
pub use scanner::{ScanError, ScanMode, UnmergedScanner};
pub use strategy::octopus::OctopusStrategy;
pub use strategy::resolve::ResolveStrategy;
pub use strategy::MergeStrategy;
pub use unpack::{MergeFn, UnpackError, UnpackOptions, UnpackSummary};

/// Most trees a single unpack accepts.
pub const MAX_UNPACK_TREES: usize = 8;

/// Conflict marker style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictStyle {
    /// Ours and theirs only.
    #[default]
    Merge,
    /// Include the base between `|||||||` and `=======`.
    Diff3,
    /// Like diff3, with the lines both sides share moved out of the conflict.
    ZDiff3,
}

impl ConflictStyle {
    /// Parse a `merge.conflictStyle` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "merge" => Some(Self::Merge),
            "diff3" => Some(Self::Diff3),
            "zdiff3" => Some(Self::ZDiff3),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Diff3 => "diff3",
            Self::ZDiff3 => "zdiff3",
        }
    }
}

/// Result of a three-way content merge.
#[derive(Debug, Clone)]
pub enum ContentMergeResult {
    Clean(Vec<u8>),
    /// Merged content with conflict markers.
    Conflict {
        content: Vec<u8>,
        conflict_count: usize,
    },
}

impl ContentMergeResult {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean(_))
    }

    /// The merged content, with or without conflict markers.
    pub fn content(&self) -> &[u8] {
        match self {
            Self::Clean(data) => data,
            Self::Conflict { content, .. } => content,
        }
    }

    pub fn into_content(self) -> Vec<u8> {
        match self {
            Self::Clean(data) => data,
            Self::Conflict { content, .. } => content,
        }
    }
}

/// Settings shared by the resolvers and strategies.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub conflict_style: ConflictStyle,
    /// Mark index entries created during resolution as assume-unchanged.
    pub assume_unchanged: bool,
    /// Suppress the per-path `Merge program failed` notice.
    pub quiet: bool,
}

impl MergeOptions {
    /// Read `core.ignorestat` and `merge.conflictstyle`.
    pub fn from_config(config: &Config) -> Result<Self, MergeError> {
        let assume_unchanged = config.get_bool_or("core.ignorestat", false)?;
        let conflict_style = match config.get_str("merge.conflictstyle") {
            None => ConflictStyle::default(),
            Some(name) => ConflictStyle::from_name(name).unwrap_or_else(|| {
                tracing::warn!("unknown style '{name}' given for 'merge.conflictstyle'");
                ConflictStyle::default()
            }),
        };
        Ok(Self {
            conflict_style,
            assume_unchanged,
            quiet: false,
        })
    }
}

/// How a strategy run ended, short of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    Clean,
    /// Conflicts are left in the index and working tree for the operator.
    Conflicted,
}

impl MergeStatus {
    /// Process exit code: 0 clean, 1 conflicted.
    pub fn code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::Conflicted => 1,
        }
    }
}

/// Outcome of a strategy run.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub status: MergeStatus,
    /// Tree of the merged index, when it is fully merged.
    pub tree: Option<ObjectId>,
    /// Commits folded into the result, in order.
    pub merged: Vec<ObjectId>,
}

impl MergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.status == MergeStatus::Clean
    }
}

/// Errors that abort a merge. Every variant maps to exit code 2.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Unable to find common commit with {name}")]
    NoMergeBase { name: String },

    #[error(
        "Your local changes to the following files would be overwritten by merge:\n  {}",
        join_paths(paths)
    )]
    LocalChanges { paths: Vec<BString> },

    #[error("cannot merge {count} trees, at most {MAX_UNPACK_TREES} are supported")]
    TooManyTrees { count: usize },

    #[error("no trees to merge")]
    NoTrees,

    #[error("Not handling anything other than two heads merge.")]
    NotTwoHeads,

    #[error("Should not be doing an octopus.")]
    NotAnOctopus,

    #[error("Automated merge did not work.")]
    OctopusAborted,

    #[error(transparent)]
    Unpack(#[from] UnpackError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Odb(#[from] octo_odb::OdbError),

    #[error(transparent)]
    Index(#[from] octo_index::IndexError),

    #[error(transparent)]
    Repo(#[from] octo_repo::RepoError),

    #[error(transparent)]
    RevWalk(#[from] octo_revwalk::RevWalkError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn join_paths(paths: &[BString]) -> String {
    paths
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("\n  ")
}
