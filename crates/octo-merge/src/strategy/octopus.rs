//! The octopus strategy: fold several remotes into our head one at a time.
//!
//! Leading remotes that are descendants of everything merged so far are
//! fast-forwarded. Once a round needs a real merge, every later round is a
//! real merge too. Only the last round may leave conflicts for the
//! operator; a conflict in any earlier round aborts the octopus.

use octo_hash::ObjectId;
use octo_index::IndexError;
use octo_repo::{Repository, WorkTree};

use super::{better_branch_name, unpack_locked, MergeStrategy};
use crate::resolver::ContentResolver;
use crate::scanner::{ScanError, ScanMode, UnmergedScanner};
use crate::{MergeError, MergeOptions, MergeOutcome, MergeStatus, MAX_UNPACK_TREES};

pub struct OctopusStrategy<'a> {
    repo: &'a Repository,
    options: MergeOptions,
}

/// Whether the merge bases of the next remote are exactly the commits
/// merged so far, in order, so the remote descends from all of them.
pub fn can_fast_forward(common: &[ObjectId], references: &[ObjectId]) -> bool {
    common == references
}

impl<'a> OctopusStrategy<'a> {
    pub fn new(repo: &'a Repository, options: MergeOptions) -> Self {
        Self { repo, options }
    }

    /// Merge every commit in `remotes` into `head`.
    ///
    /// `bases` is accepted for the calling convention only; each round
    /// computes its own merge bases against the commits merged so far.
    pub fn run(
        &self,
        bases: &[ObjectId],
        head: &ObjectId,
        remotes: &[ObjectId],
    ) -> Result<MergeOutcome, MergeError> {
        if remotes.len() < 2 {
            return Err(MergeError::NotAnOctopus);
        }
        tracing::debug!(given_bases = bases.len(), remotes = remotes.len(), "starting octopus");

        let odb = self.repo.odb();
        let worktree = self.repo.worktree()?;
        let (head, head_commit) = odb.peel_to_commit(head)?;

        let changed = self
            .repo
            .read_index()?
            .changes_against_tree(odb, &head_commit.tree)?;
        if !changed.is_empty() {
            return Err(MergeError::LocalChanges { paths: changed });
        }

        let mut references = vec![head];
        let mut reference_tree = head_commit.tree;
        let mut non_ff_merge = false;
        let mut conflicted = false;

        for remote in remotes {
            if conflicted {
                tracing::info!("Automated merge did not work.");
                return Err(MergeError::OctopusAborted);
            }

            let (c, commit) = odb.peel_to_commit(remote)?;
            let name = better_branch_name(&c);
            let common = octo_revwalk::merge_bases_many(odb, &c, &references)?;
            if common.is_empty() {
                return Err(MergeError::NoMergeBase { name });
            }
            if common.contains(&c) {
                tracing::info!("Already up to date with {name}");
                continue;
            }

            if !non_ff_merge && can_fast_forward(&common, &references) {
                tracing::info!("Fast-forwarding to: {name}");
                // From the reference tree, not head's: an earlier fast-forward may already have moved the index.
                let index = unpack_locked(self.repo, &worktree, &[reference_tree, commit.tree], false, true)?;
                reference_tree = index.write_tree(odb)?;
                references.clear();
            } else {
                non_ff_merge = true;
                tracing::info!("Trying simple merge with {name}");
                let (tree, clean) = self.merge_round(&worktree, &common, reference_tree, commit.tree)?;
                conflicted = !clean;
                if let Some(tree) = tree {
                    reference_tree = tree;
                }
            }
            references.push(c);
        }

        let status = if conflicted {
            MergeStatus::Conflicted
        } else {
            MergeStatus::Clean
        };
        Ok(MergeOutcome {
            status,
            tree: (!conflicted).then_some(reference_tree),
            merged: references,
        })
    }

    /// One real merge round. Returns the merged tree, if the index could be
    /// written as one, and whether the round was clean.
    fn merge_round(
        &self,
        worktree: &WorkTree,
        common: &[ObjectId],
        reference_tree: ObjectId,
        remote_tree: ObjectId,
    ) -> Result<(Option<ObjectId>, bool), MergeError> {
        let odb = self.repo.odb();
        let count = common.len() + 2;
        if count > MAX_UNPACK_TREES {
            return Err(MergeError::TooManyTrees { count });
        }
        let mut trees = common
            .iter()
            .map(|oid| odb.peel_to_tree(oid))
            .collect::<Result<Vec<_>, _>>()?;
        trees.push(reference_tree);
        trees.push(remote_tree);

        let index = unpack_locked(self.repo, worktree, &trees, true, true)?;
        match index.write_tree(odb) {
            Ok(tree) => return Ok((Some(tree), true)),
            Err(IndexError::Unmerged { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Simple merge did not work, trying automatic merge.");
        let mut lock = self.repo.lock_index()?;
        let resolver = ContentResolver::new(odb, worktree, self.options.clone());
        let mut scanner = UnmergedScanner::new(resolver).quiet(self.options.quiet);
        let clean = match scanner.resolve_all(lock.index_mut(), ScanMode::StopAtFirstFailure) {
            Ok(_) => true,
            Err(ScanError::ResolutionFailed { path, .. }) => {
                tracing::debug!(%path, "automatic merge stopped");
                false
            }
            Err(e) => return Err(e.into()),
        };
        let index = lock.commit()?;

        let tree = match index.write_tree(odb) {
            Ok(tree) => Some(tree),
            Err(IndexError::Unmerged { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        Ok((tree, clean))
    }
}

impl MergeStrategy for OctopusStrategy<'_> {
    fn name(&self) -> &'static str {
        "octopus"
    }

    fn merge(
        &self,
        bases: &[ObjectId],
        head: &ObjectId,
        remotes: &[ObjectId],
    ) -> Result<MergeOutcome, MergeError> {
        self.run(bases, head, remotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octo_hash::HashAlgorithm;

    fn oid(n: u8) -> ObjectId {
        ObjectId::from_bytes(&[n; 20], HashAlgorithm::Sha1).unwrap()
    }

    #[test]
    fn fast_forward_needs_exact_references() {
        assert!(can_fast_forward(&[oid(1)], &[oid(1)]));
        assert!(can_fast_forward(&[oid(1), oid(2)], &[oid(1), oid(2)]));
        assert!(!can_fast_forward(&[oid(2), oid(1)], &[oid(1), oid(2)]));
        assert!(!can_fast_forward(&[oid(1)], &[oid(1), oid(2)]));
        assert!(!can_fast_forward(&[oid(3)], &[oid(1)]));
        // After a fast-forward the reference list is empty and only a
        // remote with no bases at all could match.
        assert!(!can_fast_forward(&[oid(1)], &[]));
    }
}
