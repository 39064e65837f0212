//! Merge strategies.
//!
//! Both strategies follow the `git merge-<strategy>` calling convention:
//! the merge bases, our head, and the commits to merge in. They unpack
//! trees into the locked index, then resolve whatever is left unmerged
//! path by path.

pub mod octopus;
pub mod resolve;

use octo_hash::ObjectId;
use octo_index::Index;
use octo_repo::{Repository, WorkTree};

use crate::unpack::{unpack_trees, MergeFn, UnpackOptions};
use crate::{MergeError, MergeOutcome, MAX_UNPACK_TREES};

/// A strategy callable as `merge-<name> <bases>... -- <head> <remotes>...`.
pub trait MergeStrategy {
    fn name(&self) -> &'static str;

    fn merge(
        &self,
        bases: &[ObjectId],
        head: &ObjectId,
        remotes: &[ObjectId],
    ) -> Result<MergeOutcome, MergeError>;
}

/// Name to show for a commit: `$GITHEAD_<hex>` when set, else the hex id.
pub fn better_branch_name(oid: &ObjectId) -> String {
    let hex = oid.to_hex();
    std::env::var(format!("GITHEAD_{hex}")).unwrap_or(hex)
}

/// Lock the index, unpack `trees` into it and the working tree with the
/// merge function their count implies, and commit it.
///
/// With `require_fresh`, working tree files that differ from the index
/// stop the merge before anything is unpacked. Otherwise they only matter
/// if the merge would touch them.
pub(crate) fn unpack_locked(
    repo: &Repository,
    worktree: &WorkTree,
    trees: &[ObjectId],
    aggressive: bool,
    require_fresh: bool,
) -> Result<Index, MergeError> {
    if trees.len() > MAX_UNPACK_TREES {
        return Err(MergeError::TooManyTrees { count: trees.len() });
    }
    let merge_fn = MergeFn::for_tree_count(trees.len()).ok_or(MergeError::NoTrees)?;

    let mut lock = repo.lock_index()?;
    let stale = worktree.refresh(lock.index_mut())?;
    if require_fresh && !stale.is_empty() {
        return Err(MergeError::LocalChanges { paths: stale });
    }

    let opts = UnpackOptions {
        update: true,
        aggressive,
        initial_checkout: merge_fn == MergeFn::TwoWay && lock.index().is_unborn(),
    };
    unpack_trees(repo.odb(), worktree, lock.index_mut(), trees, merge_fn, &opts)?;
    Ok(lock.commit()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use octo_hash::HashAlgorithm;

    #[test]
    fn branch_name_falls_back_to_hex() {
        let oid = ObjectId::from_bytes(&[0xab; 20], HashAlgorithm::Sha1).unwrap();
        assert_eq!(better_branch_name(&oid), oid.to_hex());

        let named = ObjectId::from_bytes(&[0xcd; 20], HashAlgorithm::Sha1).unwrap();
        std::env::set_var(format!("GITHEAD_{}", named.to_hex()), "topic");
        assert_eq!(better_branch_name(&named), "topic");
    }
}
