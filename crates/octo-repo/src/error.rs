use std::path::PathBuf;

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a git repository (or any of the parent directories): {0}")]
    NotFound(PathBuf),

    #[error("invalid git directory: {path}: {reason}")]
    InvalidGitDir { path: PathBuf, reason: String },

    #[error("this operation must be run in a work tree")]
    BareNoWorkTree,

    #[error("bad config line {line} in {path}: {reason}")]
    Config {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("bad boolean config value '{value}' for '{key}'")]
    InvalidBool { key: String, value: String },

    #[error("not a valid object name {0}")]
    BadRevision(String),

    #[error("invalid reference {name}: {reason}")]
    InvalidRef { name: String, reason: String },

    #[error(transparent)]
    Util(#[from] octo_utils::UtilError),

    #[error(transparent)]
    Hash(#[from] octo_hash::HashError),

    #[error(transparent)]
    Odb(#[from] octo_odb::OdbError),

    #[error(transparent)]
    Index(#[from] octo_index::IndexError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
