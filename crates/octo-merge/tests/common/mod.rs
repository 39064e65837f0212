//! Repository fixture shared by the octo-merge integration tests.

#![allow(dead_code)]

use std::cell::Cell;

use bstr::BString;
use octo_hash::ObjectId;
use octo_index::{Index, IndexEntry, Stage};
use octo_merge::unpack::{unpack_trees, MergeFn, UnpackOptions};
use octo_object::{Commit, FileMode, Object, ObjectType, Signature, Tree, TreeEntry};
use octo_repo::{Repository, WorkTree};

pub struct Fixture {
    _dir: tempfile::TempDir,
    pub repo: Repository,
    pub wt: WorkTree,
    clock: Cell<i64>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let wt = repo.worktree().unwrap();
        Self {
            _dir: dir,
            repo,
            wt,
            clock: Cell::new(1_600_000_000),
        }
    }

    pub fn blob(&self, data: &str) -> ObjectId {
        self.repo.odb().write_raw(ObjectType::Blob, data.as_bytes()).unwrap()
    }

    /// A flat tree of regular files.
    pub fn tree(&self, files: &[(&str, &str)]) -> ObjectId {
        let files: Vec<_> = files.iter().map(|(p, d)| (*p, *d, FileMode::Regular)).collect();
        self.tree_with_modes(&files)
    }

    pub fn tree_with_modes(&self, files: &[(&str, &str, FileMode)]) -> ObjectId {
        let entries = files
            .iter()
            .map(|(name, data, mode)| TreeEntry {
                mode: *mode,
                name: (*name).into(),
                oid: self.blob(data),
            })
            .collect();
        self.repo.odb().write(&Object::Tree(Tree { entries })).unwrap()
    }

    pub fn commit_tree(&self, tree: ObjectId, parents: &[ObjectId]) -> ObjectId {
        let time = self.clock.get() + 60;
        self.clock.set(time);
        let sig = Signature::new("T", "t@example.com", time);
        self.repo
            .odb()
            .write(&Object::Commit(Commit {
                tree,
                parents: parents.to_vec(),
                author: sig.clone(),
                committer: sig,
                extra_headers: Vec::new(),
                message: format!("c{time}\n").into(),
            }))
            .unwrap()
    }

    pub fn commit(&self, files: &[(&str, &str)], parents: &[ObjectId]) -> ObjectId {
        self.commit_tree(self.tree(files), parents)
    }

    /// Make `commit` the checked-out head: index, working tree and HEAD.
    pub fn checkout(&self, commit: ObjectId) {
        let tree = self.repo.odb().peel_to_tree(&commit).unwrap();
        let mut lock = self.repo.lock_index().unwrap();
        let opts = UnpackOptions {
            update: true,
            aggressive: false,
            initial_checkout: lock.index().is_unborn(),
        };
        unpack_trees(
            self.repo.odb(),
            &self.wt,
            lock.index_mut(),
            &[tree],
            MergeFn::OneWay,
            &opts,
        )
        .unwrap();
        lock.commit().unwrap();
        self.repo.update_ref("HEAD", &commit).unwrap();
    }

    /// Stage `path` with the given sides. `None` leaves a stage out.
    pub fn stage(&self, path: &str, sides: [Option<(&str, FileMode)>; 3]) {
        let mut lock = self.repo.lock_index().unwrap();
        let index = lock.index_mut();
        index.remove_path(path.into());
        for (stage, side) in [Stage::Base, Stage::Ours, Stage::Theirs].into_iter().zip(sides) {
            if let Some((data, mode)) = side {
                index.add(IndexEntry::staged(path, mode, self.blob(data), stage));
            }
        }
        lock.commit().unwrap();
    }

    pub fn write(&self, path: &str, data: &str) {
        self.wt.write_file(path.into(), data.as_bytes(), FileMode::Regular).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        String::from_utf8(self.wt.read_file(path.into()).unwrap()).unwrap()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.wt.file_exists(path.into())
    }

    pub fn index(&self) -> Index {
        self.repo.read_index().unwrap()
    }

    pub fn unmerged(&self) -> Vec<BString> {
        self.index().unmerged_paths()
    }

    /// Stage numbers present for `path`.
    pub fn stages(&self, path: &str) -> Vec<u8> {
        self.index()
            .stages(path.into())
            .iter()
            .map(|e| e.stage.as_u8())
            .collect()
    }

    /// Blob content recorded at stage 0 for `path`.
    pub fn merged_blob(&self, path: &str) -> String {
        let index = self.index();
        let entry = index.get(path.into(), Stage::Normal).unwrap();
        let blob = self.repo.odb().read_blob(&entry.oid).unwrap();
        String::from_utf8(blob.data).unwrap()
    }
}
