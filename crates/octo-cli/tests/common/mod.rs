//! Shared harness for octo-cli integration tests: a scratch repository built
//! through the library crates and a runner for the `octo` binary.

#![allow(dead_code)]

use std::cell::Cell;
use std::path::Path;
use std::process::Command;

use octo_hash::ObjectId;
use octo_merge::unpack::{unpack_trees, MergeFn, UnpackOptions};
use octo_object::{Commit, FileMode, Object, ObjectType, Signature, Tree, TreeEntry};
use octo_repo::Repository;

/// Captured output from running a command.
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

pub fn octo(dir: &Path, args: &[&str]) -> CommandResult {
    let output = Command::new(env!("CARGO_BIN_EXE_octo"))
        .args(args)
        .current_dir(dir)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .env_remove("GIT_INDEX_FILE")
        .env_remove("GIT_OBJECT_DIRECTORY")
        .env("OCTO_LOG", "info")
        .output()
        .unwrap();
    CommandResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
    }
}

pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
    clock: Cell<i64>,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self {
            dir,
            repo,
            clock: Cell::new(1_700_000_000),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn run(&self, args: &[&str]) -> CommandResult {
        octo(self.path(), args)
    }

    pub fn blob(&self, data: &str) -> ObjectId {
        self.repo.odb().write_raw(ObjectType::Blob, data.as_bytes()).unwrap()
    }

    pub fn commit(&self, files: &[(&str, &str)], parents: &[ObjectId]) -> ObjectId {
        let entries = files
            .iter()
            .map(|(name, data)| TreeEntry {
                mode: FileMode::Regular,
                name: (*name).into(),
                oid: self.blob(data),
            })
            .collect();
        let tree = self.repo.odb().write(&Object::Tree(Tree { entries })).unwrap();
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

    /// Check `commit` out into the index and working tree and point HEAD at it.
    pub fn checkout(&self, commit: ObjectId) {
        let wt = self.repo.worktree().unwrap();
        let tree = self.repo.odb().peel_to_tree(&commit).unwrap();
        let mut lock = self.repo.lock_index().unwrap();
        let opts = UnpackOptions {
            update: true,
            aggressive: false,
            initial_checkout: lock.index().is_unborn(),
        };
        unpack_trees(self.repo.odb(), &wt, lock.index_mut(), &[tree], MergeFn::OneWay, &opts).unwrap();
        lock.commit().unwrap();
        self.repo.update_ref("HEAD", &commit).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.path().join(path)).unwrap()
    }

    pub fn unmerged(&self) -> Vec<String> {
        self.repo
            .read_index()
            .unwrap()
            .unmerged_paths()
            .into_iter()
            .map(|p| p.to_string())
            .collect()
    }
}
