//! Reading one to eight trees into the index and working tree, with the
//! per-path rules of `read-tree -m -u`.
//!
//! [`unpack_trees`] works in two passes. The first decides every path
//! against the current index and checks the working tree, without touching
//! anything. Only when every path is acceptable does the second pass remove
//! and write files and replace the index entries, so a rejected merge leaves
//! both exactly as they were.
//!
//! Merge functions, by tree count:
//!
//! - one tree: the tree's state wins everywhere ([`MergeFn::OneWay`]);
//! - two trees: move from the first (the current head) to the second,
//!   carrying local changes that do not collide ([`MergeFn::TwoWay`]);
//! - three or more: bases, then head, then the remote. Paths that cannot be
//!   decided at tree level are left as conflict stages
//!   ([`MergeFn::ThreeWay`]).

use std::collections::{BTreeMap, BTreeSet};

use bstr::{BStr, BString, ByteSlice};
use octo_hash::ObjectId;
use octo_index::{Index, IndexEntry, Stage};
use octo_odb::ObjectDatabase;
use octo_repo::WorkTree;

use crate::resolver::Side;
use crate::MAX_UNPACK_TREES;

#[derive(Debug, Clone, Default)]
pub struct UnpackOptions {
    /// Update the working tree along with the index.
    pub update: bool,
    /// Resolve the trivial three-way cases (deleted on both sides, deleted
    /// on one side and unchanged on the other) at tree level.
    pub aggressive: bool,
    /// The index was unborn; files already in the working tree are not
    /// treated as untracked.
    pub initial_checkout: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeFn {
    OneWay,
    TwoWay,
    /// `head_idx` is the position of our tree; the trees before it are bases
    /// and the one after it is the remote.
    ThreeWay { head_idx: usize },
}

impl MergeFn {
    /// The merge function `read-tree -m` uses for `count` trees.
    pub fn for_tree_count(count: usize) -> Option<Self> {
        match count {
            0 => None,
            1 => Some(Self::OneWay),
            2 => Some(Self::TwoWay),
            n => Some(Self::ThreeWay { head_idx: n - 2 }),
        }
    }

    fn accepts(self, count: usize) -> bool {
        match self {
            Self::OneWay => count == 1,
            Self::TwoWay => count == 2,
            Self::ThreeWay { head_idx } => head_idx >= 1 && head_idx + 2 == count,
        }
    }
}

/// What an unpack did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    /// Paths left with conflict stages.
    pub unmerged: usize,
    /// Files written to the working tree.
    pub updated: usize,
    /// Files removed from the working tree.
    pub removed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum UnpackError {
    #[error("Entry '{path}' would be overwritten by merge. Cannot merge.")]
    WouldOverwrite { path: BString },

    #[error("Entry '{path}' not uptodate. Cannot merge.")]
    NotUptodate { path: BString },

    #[error("Untracked working tree file '{path}' would be overwritten by merge.")]
    UntrackedOverwritten { path: BString },

    #[error("Untracked working tree file '{path}' would be removed by merge.")]
    UntrackedRemoved { path: BString },

    #[error("'{path}' would be both a file and a directory")]
    DirectoryFileConflict { path: BString },

    #[error("you need to resolve your current index first")]
    UnmergedIndex,

    #[error("no trees to unpack")]
    NoTrees,

    #[error("cannot unpack {count} trees, at most {MAX_UNPACK_TREES} are supported")]
    TooManyTrees { count: usize },

    #[error("{merge_fn:?} merge cannot take {count} trees")]
    WrongTreeCount { merge_fn: MergeFn, count: usize },

    #[error(transparent)]
    Odb(#[from] octo_odb::OdbError),

    #[error(transparent)]
    Repo(#[from] octo_repo::RepoError),
}

/// Merge `trees` into `index` (and the working tree when
/// [`UnpackOptions::update`] is set) using `merge_fn`.
///
/// On error nothing has been changed.
pub fn unpack_trees(
    odb: &ObjectDatabase,
    worktree: &WorkTree,
    index: &mut Index,
    trees: &[ObjectId],
    merge_fn: MergeFn,
    opts: &UnpackOptions,
) -> Result<UnpackSummary, UnpackError> {
    if trees.is_empty() {
        return Err(UnpackError::NoTrees);
    }
    if trees.len() > MAX_UNPACK_TREES {
        return Err(UnpackError::TooManyTrees { count: trees.len() });
    }
    if !merge_fn.accepts(trees.len()) {
        return Err(UnpackError::WrongTreeCount {
            merge_fn,
            count: trees.len(),
        });
    }
    if index.has_unmerged() {
        return Err(UnpackError::UnmergedIndex);
    }

    let flattened = trees
        .iter()
        .map(|tree| flatten(odb, tree))
        .collect::<Result<Vec<_>, _>>()?;

    let mut paths: BTreeSet<&BStr> = index.iter().map(|e| e.path.as_bstr()).collect();
    for files in &flattened {
        paths.extend(files.keys().map(|p| p.as_bstr()));
    }

    let mut plan = Planner {
        worktree,
        opts,
        old: index,
        plan: Plan::default(),
    };
    let mut sides = Vec::with_capacity(trees.len());
    for path in paths {
        sides.clear();
        sides.extend(flattened.iter().map(|files| files.get(path).copied()));
        let old = index.get(path, Stage::Normal);
        match merge_fn {
            MergeFn::OneWay => plan.oneway(path, old, sides[0])?,
            MergeFn::TwoWay => plan.twoway(path, old, sides[0], sides[1])?,
            MergeFn::ThreeWay { head_idx } => plan.threeway(path, old, &sides, head_idx)?,
        }
    }
    let plan = plan.plan;
    plan.check_directory_file()?;

    let summary = plan.apply(odb, worktree, index)?;
    tracing::debug!(
        trees = trees.len(),
        ?merge_fn,
        unmerged = summary.unmerged,
        updated = summary.updated,
        removed = summary.removed,
        "unpacked trees"
    );
    Ok(summary)
}

fn flatten(odb: &ObjectDatabase, tree: &ObjectId) -> Result<BTreeMap<BString, Side>, UnpackError> {
    Ok(odb
        .flatten_tree(tree)?
        .into_iter()
        .map(|f| (f.path, Side::new(f.oid, f.mode)))
        .collect())
}

/// Whether the index entry (or its absence) is the same as the tree side.
fn same(entry: Option<&IndexEntry>, side: Option<Side>) -> bool {
    match (entry, side) {
        (None, None) => true,
        (Some(e), Some(s)) => e.same_content(s.mode, &s.oid),
        _ => false,
    }
}

/// The new index contents and the working tree changes that produce them.
#[derive(Debug, Default)]
struct Plan {
    entries: Vec<IndexEntry>,
    /// Positions in `entries` to write out.
    checkouts: Vec<usize>,
    removals: Vec<BString>,
    unmerged: usize,
}

impl Plan {
    /// A path may not be both a file and a leading directory of another.
    fn check_directory_file(&self) -> Result<(), UnpackError> {
        let paths: BTreeSet<&BStr> = self.entries.iter().map(|e| e.path.as_bstr()).collect();
        for path in &paths {
            for i in path.find_iter("/") {
                let dir = path[..i].as_bstr();
                if paths.contains(&dir) {
                    return Err(UnpackError::DirectoryFileConflict { path: dir.to_owned() });
                }
            }
        }
        Ok(())
    }

    fn apply(
        mut self,
        odb: &ObjectDatabase,
        worktree: &WorkTree,
        index: &mut Index,
    ) -> Result<UnpackSummary, UnpackError> {
        for path in &self.removals {
            worktree.remove_file(path.as_bstr())?;
        }
        for &pos in &self.checkouts {
            let entry = &mut self.entries[pos];
            let data = if entry.mode.is_gitlink() {
                Vec::new()
            } else {
                odb.read_blob(&entry.oid)?.data
            };
            entry.stat = worktree.write_file(entry.path.as_bstr(), &data, entry.mode)?;
        }
        let summary = UnpackSummary {
            unmerged: self.unmerged,
            updated: self.checkouts.len(),
            removed: self.removals.len(),
        };
        index.replace_entries(self.entries);
        Ok(summary)
    }
}

struct Planner<'a> {
    worktree: &'a WorkTree,
    opts: &'a UnpackOptions,
    old: &'a Index,
    plan: Plan,
}

impl Planner<'_> {
    fn oneway(&mut self, path: &BStr, old: Option<&IndexEntry>, tree: Option<Side>) -> Result<(), UnpackError> {
        match tree {
            None => self.deleted(path, old),
            Some(_) if same(old, tree) => {
                self.keep(old);
                Ok(())
            }
            Some(side) => self.merged(path, side, old),
        }
    }

    fn twoway(
        &mut self,
        path: &BStr,
        current: Option<&IndexEntry>,
        old_tree: Option<Side>,
        new_tree: Option<Side>,
    ) -> Result<(), UnpackError> {
        if let Some(cur) = current {
            let keep = match (old_tree, new_tree) {
                (None, None) => true,
                (None, Some(_)) => same(current, new_tree),
                (Some(o), Some(n)) => o == n || same(current, new_tree),
                (Some(_), None) => false,
            };
            if keep {
                self.keep(current);
                return Ok(());
            }
            if same(current, old_tree) {
                return match new_tree {
                    None => self.deleted(path, current),
                    Some(n) => self.merged(path, n, current),
                };
            }
            return Err(UnpackError::WouldOverwrite { path: cur.path.clone() });
        }

        match (old_tree, new_tree) {
            (Some(o), Some(n)) if !self.opts.initial_checkout => {
                // Removal of the path is staged: keep it removed only if
                // the new tree did not change it.
                if o == n {
                    Ok(())
                } else {
                    Err(UnpackError::WouldOverwrite { path: path.to_owned() })
                }
            }
            (_, Some(n)) => self.merged(path, n, None),
            (_, None) => self.deleted(path, None),
        }
    }

    fn threeway(
        &mut self,
        path: &BStr,
        index: Option<&IndexEntry>,
        sides: &[Option<Side>],
        head_idx: usize,
    ) -> Result<(), UnpackError> {
        let bases = &sides[..head_idx];
        let head = sides[head_idx];
        let remote = sides[head_idx + 1];

        let any_base_missing = bases.iter().any(Option::is_none);
        // A base matching both would make head == remote, handled below.
        let (head_match, remote_match) = if head != remote {
            (bases.contains(&head), bases.contains(&remote))
        } else {
            (false, false)
        };

        // Only the remote changed; the index may already hold its version.
        if let Some(r) = remote {
            if head_match && !remote_match {
                if index.is_some() && !same(index, remote) && !same(index, head) {
                    return Err(self.reject(path));
                }
                return self.merged(path, r, index);
            }
        }

        if index.is_some() && !same(index, head) {
            return Err(self.reject(path));
        }

        if let Some(h) = head {
            // Both sides agree, or only our side changed.
            if head == remote || (remote_match && !head_match) {
                return self.merged(path, h, index);
            }
        }

        if head.is_none() && remote.is_none() && any_base_missing {
            return Ok(());
        }

        if self.opts.aggressive {
            let head_deleted = head.is_none();
            let remote_deleted = remote.is_none();
            if (head_deleted && remote_deleted)
                || (head_deleted && remote.is_some() && remote_match)
                || (remote_deleted && head.is_some() && head_match)
            {
                if index.is_some() {
                    return self.deleted(path, index);
                }
                if !head_deleted {
                    self.verify_absent(path, true)?;
                }
                return Ok(());
            }
        }

        // From here on the path conflicts, and the working tree file will
        // receive the merge result.
        if let Some(entry) = index {
            self.verify_uptodate(entry)?;
        }

        let mut stages = Vec::with_capacity(3);
        if !head_match || !remote_match {
            if let Some(base) = bases.iter().flatten().next() {
                stages.push((Stage::Base, *base));
            }
        }
        stages.extend(head.map(|h| (Stage::Ours, h)));
        stages.extend(remote.map(|r| (Stage::Theirs, r)));
        self.conflict(path, &stages);
        Ok(())
    }

    fn keep(&mut self, entry: Option<&IndexEntry>) {
        if let Some(entry) = entry {
            self.plan.entries.push(entry.clone());
        }
    }

    /// `path` takes `side`; `old` is what the index had.
    fn merged(&mut self, path: &BStr, side: Side, old: Option<&IndexEntry>) -> Result<(), UnpackError> {
        match old {
            Some(old) if old.same_content(side.mode, &side.oid) => {
                self.plan.entries.push(old.clone());
                return Ok(());
            }
            Some(old) => self.verify_uptodate(old)?,
            None => self.verify_absent(path, false)?,
        }
        self.plan
            .entries
            .push(IndexEntry::new(path.to_owned(), side.mode, side.oid));
        if self.opts.update {
            self.plan.checkouts.push(self.plan.entries.len() - 1);
        }
        Ok(())
    }

    /// `path` goes away; `old` is what the index had.
    fn deleted(&mut self, path: &BStr, old: Option<&IndexEntry>) -> Result<(), UnpackError> {
        let Some(old) = old else {
            return self.verify_absent(path, true);
        };
        self.verify_uptodate(old)?;
        if self.opts.update {
            self.plan.removals.push(path.to_owned());
        }
        Ok(())
    }

    fn conflict(&mut self, path: &BStr, stages: &[(Stage, Side)]) {
        if stages.is_empty() {
            return;
        }
        for &(stage, side) in stages {
            self.plan
                .entries
                .push(IndexEntry::staged(path.to_owned(), side.mode, side.oid, stage));
        }
        self.plan.unmerged += 1;
    }

    fn reject(&self, path: &BStr) -> UnpackError {
        UnpackError::WouldOverwrite { path: path.to_owned() }
    }

    /// The working tree file behind `entry` must not have local changes.
    fn verify_uptodate(&self, entry: &IndexEntry) -> Result<(), UnpackError> {
        if !self.opts.update || entry.flags.assume_valid || entry.flags.skip_worktree {
            return Ok(());
        }
        let path = entry.path.as_bstr();
        if self.worktree.lstat(path)?.is_none() || !self.worktree.is_modified(entry)? {
            return Ok(());
        }
        Err(UnpackError::NotUptodate { path: path.to_owned() })
    }

    /// Nothing untracked may sit at `path`, except a directory holding only
    /// tracked files.
    fn verify_absent(&self, path: &BStr, removing: bool) -> Result<(), UnpackError> {
        if !self.opts.update || self.opts.initial_checkout {
            return Ok(());
        }
        let Some(meta) = self.worktree.lstat(path)? else {
            return Ok(());
        };
        if meta.is_dir() && self.tracked_below(path) {
            return Ok(());
        }
        let path = path.to_owned();
        Err(if removing {
            UnpackError::UntrackedRemoved { path }
        } else {
            UnpackError::UntrackedOverwritten { path }
        })
    }

    fn tracked_below(&self, dir: &BStr) -> bool {
        let mut prefix = dir.to_owned();
        prefix.push(b'/');
        let pos = match self.old.name_pos(prefix.as_bstr()) {
            Ok(i) | Err(i) => i,
        };
        self.old
            .entries()
            .get(pos)
            .is_some_and(|e| e.path.starts_with(prefix.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octo_object::{FileMode, Object, ObjectType, Tree, TreeEntry};
    use octo_repo::Repository;

    struct Repo {
        _dir: tempfile::TempDir,
        repo: Repository,
        wt: WorkTree,
    }

    fn repo() -> Repo {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let wt = repo.worktree().unwrap();
        Repo { _dir: dir, repo, wt }
    }

    impl Repo {
        fn blob(&self, data: &str) -> ObjectId {
            self.repo.odb().write_raw(ObjectType::Blob, data.as_bytes()).unwrap()
        }

        /// A flat tree of regular files.
        fn tree(&self, files: &[(&str, &str)]) -> ObjectId {
            let entries = files
                .iter()
                .map(|(name, data)| TreeEntry {
                    mode: FileMode::Regular,
                    name: (*name).into(),
                    oid: self.blob(data),
                })
                .collect();
            self.repo.odb().write(&Object::Tree(Tree { entries })).unwrap()
        }

        fn unpack(
            &self,
            index: &mut Index,
            trees: &[ObjectId],
            aggressive: bool,
        ) -> Result<UnpackSummary, UnpackError> {
            let opts = UnpackOptions {
                update: true,
                aggressive,
                initial_checkout: index.is_unborn(),
            };
            let merge_fn = MergeFn::for_tree_count(trees.len()).unwrap();
            unpack_trees(self.repo.odb(), &self.wt, index, trees, merge_fn, &opts)
        }

        fn read(&self, path: &str) -> String {
            String::from_utf8(self.wt.read_file(path.into()).unwrap()).unwrap()
        }
    }

    fn stages(index: &Index, path: &str) -> Vec<u8> {
        index.stages(path.into()).iter().map(|e| e.stage.as_u8()).collect()
    }

    #[test]
    fn merge_fn_by_tree_count() {
        assert_eq!(MergeFn::for_tree_count(0), None);
        assert_eq!(MergeFn::for_tree_count(1), Some(MergeFn::OneWay));
        assert_eq!(MergeFn::for_tree_count(2), Some(MergeFn::TwoWay));
        assert_eq!(MergeFn::for_tree_count(5), Some(MergeFn::ThreeWay { head_idx: 3 }));
        assert!(!MergeFn::ThreeWay { head_idx: 1 }.accepts(4));
    }

    #[test]
    fn oneway_checks_out_tree() {
        let r = repo();
        let tree = r.tree(&[("a", "1\n"), ("b", "2\n")]);
        let mut index = Index::new(r.repo.hash_algo());

        let summary = r.unpack(&mut index, &[tree], false).unwrap();
        assert_eq!(summary.updated, 2);
        assert_eq!(r.read("b"), "2\n");
        assert_eq!(index.write_tree(r.repo.odb()).unwrap(), tree);
    }

    #[test]
    fn twoway_fast_forward_updates_and_removes() {
        let r = repo();
        let old = r.tree(&[("keep", "k\n"), ("edit", "1\n"), ("drop", "d\n")]);
        let new = r.tree(&[("keep", "k\n"), ("edit", "2\n"), ("add", "a\n")]);
        let mut index = Index::new(r.repo.hash_algo());
        r.unpack(&mut index, &[old], false).unwrap();

        let summary = r.unpack(&mut index, &[old, new], false).unwrap();
        assert_eq!(summary, UnpackSummary { unmerged: 0, updated: 2, removed: 1 });
        assert_eq!(r.read("edit"), "2\n");
        assert_eq!(r.read("add"), "a\n");
        assert!(!r.wt.file_exists("drop".into()));
        assert_eq!(index.write_tree(r.repo.odb()).unwrap(), new);
    }

    #[test]
    fn twoway_refuses_to_clobber_local_edits() {
        let r = repo();
        let old = r.tree(&[("f", "1\n")]);
        let new = r.tree(&[("f", "2\n")]);
        let mut index = Index::new(r.repo.hash_algo());
        r.unpack(&mut index, &[old], false).unwrap();
        r.wt.write_file("f".into(), b"local\n", FileMode::Regular).unwrap();

        let err = r.unpack(&mut index, &[old, new], false).unwrap_err();
        assert_eq!(err.to_string(), "Entry 'f' not uptodate. Cannot merge.");
        // Nothing was applied.
        assert_eq!(r.read("f"), "local\n");
        assert_eq!(index.get("f".into(), Stage::Normal).unwrap().oid, r.blob("1\n"));
    }

    #[test]
    fn untracked_file_blocks_checkout() {
        let r = repo();
        let old = r.tree(&[("f", "1\n")]);
        let new = r.tree(&[("f", "1\n"), ("g", "new\n")]);
        let mut index = Index::new(r.repo.hash_algo());
        r.unpack(&mut index, &[old], false).unwrap();
        r.wt.write_file("g".into(), b"mine\n", FileMode::Regular).unwrap();

        let err = r.unpack(&mut index, &[old, new], false).unwrap_err();
        assert!(matches!(err, UnpackError::UntrackedOverwritten { ref path } if path == "g"));
        assert_eq!(r.read("g"), "mine\n");
    }

    #[test]
    fn threeway_trivial_cases() {
        let r = repo();
        let base = r.tree(&[("same", "s\n"), ("ours", "o\n"), ("theirs", "t\n"), ("gone", "g\n")]);
        let head = r.tree(&[("same", "s\n"), ("ours", "O\n"), ("theirs", "t\n"), ("gone", "g\n")]);
        let remote = r.tree(&[("same", "s\n"), ("ours", "o\n"), ("theirs", "T\n")]);
        let mut index = Index::new(r.repo.hash_algo());
        r.unpack(&mut index, &[head], false).unwrap();

        let summary = r.unpack(&mut index, &[base, head, remote], true).unwrap();
        assert_eq!(summary.unmerged, 0);
        assert_eq!(r.read("ours"), "O\n");
        assert_eq!(r.read("theirs"), "T\n");
        assert!(!r.wt.file_exists("gone".into()));
        assert!(index.get("gone".into(), Stage::Normal).is_none());
    }

    #[test]
    fn threeway_leaves_real_conflicts_staged() {
        let r = repo();
        let base = r.tree(&[("f", "a\n"), ("d", "x\n")]);
        let head = r.tree(&[("f", "b\n"), ("d", "x\n")]);
        let remote = r.tree(&[("f", "c\n")]);
        let mut index = Index::new(r.repo.hash_algo());
        r.unpack(&mut index, &[head], false).unwrap();

        let summary = r.unpack(&mut index, &[base, head, remote], false).unwrap();
        assert_eq!(summary.unmerged, 2);
        assert_eq!(stages(&index, "f"), vec![1, 2, 3]);
        // Without the aggressive rules a one-sided delete is a conflict too.
        assert_eq!(stages(&index, "d"), vec![1, 2]);
        // The working tree still has our version.
        assert_eq!(r.read("f"), "b\n");
    }

    #[test]
    fn aggressive_resolves_one_sided_delete() {
        let r = repo();
        let base = r.tree(&[("d", "x\n")]);
        let head = r.tree(&[("d", "x\n")]);
        let remote = r.tree(&[]);
        let mut index = Index::new(r.repo.hash_algo());
        r.unpack(&mut index, &[head], false).unwrap();

        let summary = r.unpack(&mut index, &[base, head, remote], true).unwrap();
        assert_eq!(summary, UnpackSummary { unmerged: 0, updated: 0, removed: 1 });
        assert!(index.is_empty());
    }

    #[test]
    fn index_must_match_head_for_threeway() {
        let r = repo();
        let base = r.tree(&[("f", "a\n")]);
        let head = r.tree(&[("f", "b\n")]);
        let remote = r.tree(&[("f", "c\n")]);
        let mut index = Index::new(r.repo.hash_algo());
        r.unpack(&mut index, &[base], false).unwrap();

        let err = r.unpack(&mut index, &[base, head, remote], true).unwrap_err();
        assert_eq!(err.to_string(), "Entry 'f' would be overwritten by merge. Cannot merge.");
    }

    #[test]
    fn unmerged_index_is_rejected() {
        let r = repo();
        let tree = r.tree(&[("f", "a\n")]);
        let mut index = Index::new(r.repo.hash_algo());
        index.add(IndexEntry::staged("f", FileMode::Regular, r.blob("a\n"), Stage::Ours));
        assert!(matches!(
            r.unpack(&mut index, &[tree], false),
            Err(UnpackError::UnmergedIndex)
        ));
    }

    #[test]
    fn file_and_directory_collision() {
        let r = repo();
        let nested = r.tree(&[("b", "inner\n")]);
        let with_dir = r
            .repo
            .odb()
            .write(&Object::Tree(Tree {
                entries: vec![TreeEntry {
                    mode: FileMode::Tree,
                    name: "a".into(),
                    oid: nested,
                }],
            }))
            .unwrap();
        let mut index = Index::new(r.repo.hash_algo());
        index.add(IndexEntry::new("a", FileMode::Regular, r.blob("file\n")));

        // A locally added file "a" survives the two-way merge, but the new
        // tree wants "a/b".
        let empty = r.tree(&[]);
        let err = r.unpack(&mut index, &[empty, with_dir], false).unwrap_err();
        assert!(matches!(err, UnpackError::DirectoryFileConflict { ref path } if path == "a"));
    }

    #[test]
    fn tree_count_limits() {
        let r = repo();
        let tree = r.tree(&[]);
        let mut index = Index::new(r.repo.hash_algo());
        let opts = UnpackOptions::default();
        let too_many = vec![tree; MAX_UNPACK_TREES + 1];
        assert!(matches!(
            unpack_trees(r.repo.odb(), &r.wt, &mut index, &too_many, MergeFn::ThreeWay { head_idx: 7 }, &opts),
            Err(UnpackError::TooManyTrees { count: 9 })
        ));
        assert!(matches!(
            unpack_trees(r.repo.odb(), &r.wt, &mut index, &[], MergeFn::OneWay, &opts),
            Err(UnpackError::NoTrees)
        ));
    }
}
