//! Commit graph queries over the object database.

mod merge_base;

pub use merge_base::{is_ancestor, merge_bases, merge_bases_many};

use octo_hash::ObjectId;

/// Errors from walking the commit graph.
#[derive(Debug, thiserror::Error)]
pub enum RevWalkError {
    #[error("commit not found: {0}")]
    CommitNotFound(ObjectId),

    #[error("object is not a commit: {0}")]
    NotACommit(ObjectId),

    #[error(transparent)]
    Odb(#[from] octo_odb::OdbError),
}
