//! The resolve strategy: a tree-level three-way merge followed by per-path
//! content resolution for whatever the trees could not decide.

use octo_hash::ObjectId;
use octo_index::IndexError;
use octo_repo::Repository;

use super::{unpack_locked, MergeStrategy};
use crate::resolver::ContentResolver;
use crate::scanner::{ScanMode, UnmergedScanner};
use crate::{MergeError, MergeOptions, MergeOutcome, MergeStatus};

pub struct ResolveStrategy<'a> {
    repo: &'a Repository,
    options: MergeOptions,
}

impl<'a> ResolveStrategy<'a> {
    pub fn new(repo: &'a Repository, options: MergeOptions) -> Self {
        Self { repo, options }
    }

    /// Merge `remote` into `head` over `bases`.
    ///
    /// The trees of the bases, head and remote, in that order, are unpacked
    /// aggressively. If the index is then fully merged the merge is clean.
    /// Otherwise every unmerged path goes through a [`ContentResolver`];
    /// paths that still fail stay conflicted in the index and working tree
    /// and the outcome is [`MergeStatus::Conflicted`].
    pub fn run(
        &self,
        bases: &[ObjectId],
        head: Option<&ObjectId>,
        remote: Option<&ObjectId>,
    ) -> Result<MergeOutcome, MergeError> {
        let odb = self.repo.odb();
        let worktree = self.repo.worktree()?;

        let trees = bases
            .iter()
            .chain(head)
            .chain(remote)
            .map(|oid| odb.peel_to_tree(oid))
            .collect::<Result<Vec<_>, _>>()?;
        let merged: Vec<ObjectId> = head.into_iter().chain(remote).copied().collect();

        let index = unpack_locked(self.repo, &worktree, &trees, true, false)?;
        tracing::info!("Trying simple merge.");

        match index.write_tree(odb) {
            Ok(tree) => {
                return Ok(MergeOutcome {
                    status: MergeStatus::Clean,
                    tree: Some(tree),
                    merged,
                })
            }
            Err(IndexError::Unmerged { paths }) => {
                tracing::debug!(count = paths.len(), "paths left unmerged by tree merge");
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Simple merge failed, trying Automatic merge.");
        let mut lock = self.repo.lock_index()?;
        let resolver = ContentResolver::new(odb, &worktree, self.options.clone());
        let mut scanner = UnmergedScanner::new(resolver).quiet(self.options.quiet);
        let failed = scanner.resolve_all(lock.index_mut(), ScanMode::KeepGoing)?;
        let index = lock.commit()?;

        if failed > 0 {
            tracing::debug!(failed, "automatic merge left conflicts");
            return Ok(MergeOutcome {
                status: MergeStatus::Conflicted,
                tree: None,
                merged,
            });
        }
        Ok(MergeOutcome {
            status: MergeStatus::Clean,
            tree: Some(index.write_tree(odb)?),
            merged,
        })
    }
}

impl MergeStrategy for ResolveStrategy<'_> {
    fn name(&self) -> &'static str {
        "resolve"
    }

    fn merge(
        &self,
        bases: &[ObjectId],
        head: &ObjectId,
        remotes: &[ObjectId],
    ) -> Result<MergeOutcome, MergeError> {
        match remotes {
            [remote] => self.run(bases, Some(head), Some(remote)),
            _ => Err(MergeError::NotTwoHeads),
        }
    }
}
