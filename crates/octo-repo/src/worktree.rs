//! Working tree access in index-path terms.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice, ByteVec};
use octo_hash::hasher::Hasher;
use octo_hash::{HashAlgorithm, ObjectId};
use octo_index::{Index, IndexEntry, Stage, StatData};
use octo_object::FileMode;
use octo_utils::path::{to_native, verify_path};

use crate::RepoError;

/// The checked-out files of a non-bare repository.
#[derive(Debug, Clone)]
pub struct WorkTree {
    root: PathBuf,
    hash_algo: HashAlgorithm,
    trust_filemode: bool,
}

impl WorkTree {
    pub fn new(root: impl Into<PathBuf>, hash_algo: HashAlgorithm, trust_filemode: bool) -> Self {
        Self {
            root: root.into(),
            hash_algo,
            trust_filemode,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validated filesystem path for an index path.
    pub fn native_path(&self, path: &BStr) -> Result<PathBuf, RepoError> {
        verify_path(path)?;
        Ok(to_native(&self.root, path))
    }

    /// `lstat`; `None` when nothing is there.
    pub fn lstat(&self, path: &BStr) -> Result<Option<fs::Metadata>, RepoError> {
        match fs::symlink_metadata(self.native_path(path)?) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether anything (file, symlink or directory) occupies `path`.
    pub fn file_exists(&self, path: &BStr) -> bool {
        matches!(self.lstat(path), Ok(Some(_)))
    }

    /// Replace whatever is at `path` with `data` as a `mode` entry and return
    /// the new stat data for the index.
    pub fn write_file(&self, path: &BStr, data: &[u8], mode: FileMode) -> Result<StatData, RepoError> {
        let native = self.native_path(path)?;
        if let Some(parent) = native.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::symlink_metadata(&native) {
            Ok(meta) if meta.is_dir() => {
                if !mode.is_gitlink() {
                    fs::remove_dir(&native)?;
                }
            }
            Ok(_) => fs::remove_file(&native)?,
            Err(e) if is_missing(&e) => {}
            Err(e) => return Err(e.into()),
        }

        if mode.is_gitlink() {
            fs::create_dir_all(&native)?;
            return Ok(StatData::default());
        }
        if mode.is_symlink() {
            write_symlink(&native, data)?;
        } else {
            fs::write(&native, data)?;
            set_permissions(&native, mode)?;
        }
        tracing::debug!(path = %path, %mode, "wrote working tree file");
        Ok(StatData::from_metadata(&fs::symlink_metadata(&native)?))
    }

    /// Remove `path` and any directories it leaves empty.
    pub fn remove_file(&self, path: &BStr) -> Result<(), RepoError> {
        let native = self.native_path(path)?;
        match fs::remove_file(&native) {
            Ok(()) => {}
            Err(e) if is_missing(&e) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let mut dir = native.parent();
        while let Some(d) = dir {
            if d == self.root || fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
        Ok(())
    }

    /// File contents, or the link target for a symlink.
    pub fn read_file(&self, path: &BStr) -> Result<Vec<u8>, RepoError> {
        let native = self.native_path(path)?;
        if fs::symlink_metadata(&native)?.file_type().is_symlink() {
            let target = fs::read_link(&native)?;
            return Ok(Vec::from_path_lossy(&target).into_owned());
        }
        Ok(fs::read(&native)?)
    }

    /// Blob id the file at `path` would get.
    pub fn hash_file(&self, path: &BStr) -> Result<ObjectId, RepoError> {
        let data = self.read_file(path)?;
        Ok(Hasher::hash_object(self.hash_algo, "blob", &data)?)
    }

    /// Mode to record for `meta`, given the mode the index had.
    pub fn mode_for(&self, meta: &fs::Metadata, index_mode: FileMode) -> FileMode {
        let ft = meta.file_type();
        if ft.is_symlink() {
            return FileMode::Symlink;
        }
        if ft.is_dir() {
            return FileMode::Gitlink;
        }
        if !self.trust_filemode {
            return match index_mode {
                FileMode::Executable => FileMode::Executable,
                _ => FileMode::Regular,
            };
        }
        if is_executable(meta) {
            FileMode::Executable
        } else {
            FileMode::Regular
        }
    }

    /// Whether the working tree file differs from `entry`, first by stat data
    /// and then by content.
    pub fn is_modified(&self, entry: &IndexEntry) -> Result<bool, RepoError> {
        Ok(self.check_entry(entry)?.is_none())
    }

    /// `Some(fresh stat)` when the file still matches `entry`.
    fn check_entry(&self, entry: &IndexEntry) -> Result<Option<StatData>, RepoError> {
        let Some(meta) = self.lstat(entry.path.as_bstr())? else {
            return Ok(None);
        };
        if entry.mode.is_gitlink() {
            return Ok(meta.is_dir().then_some(entry.stat));
        }
        if self.mode_for(&meta, entry.mode) != entry.mode {
            return Ok(None);
        }
        if entry.stat.matches(&meta) {
            return Ok(Some(entry.stat));
        }
        if self.hash_file(entry.path.as_bstr())? == entry.oid {
            return Ok(Some(StatData::from_metadata(&meta)));
        }
        Ok(None)
    }

    /// Re-validate stage-0 entries against the working tree: refresh cached
    /// stat data for unchanged files and return paths that really changed.
    ///
    /// Entries marked assume-valid are trusted without looking.
    pub fn refresh(&self, index: &mut Index) -> Result<Vec<BString>, RepoError> {
        let mut stale = Vec::new();
        let mut updates = Vec::new();
        for entry in index.iter() {
            if entry.stage != Stage::Normal || entry.flags.assume_valid || entry.flags.intent_to_add {
                continue;
            }
            match self.check_entry(entry)? {
                Some(stat) if stat != entry.stat => updates.push((entry.path.clone(), stat)),
                Some(_) => {}
                None => stale.push(entry.path.clone()),
            }
        }
        for (path, stat) in updates {
            if let Some(entry) = index.get_mut(path.as_bstr(), Stage::Normal) {
                entry.stat = stat;
            }
        }
        if !stale.is_empty() {
            tracing::debug!(count = stale.len(), "index has stale entries");
        }
        Ok(stale)
    }
}

fn is_missing(e: &io::Error) -> bool {
    // A file where a directory was expected reads as ENOTDIR.
    e.kind() == io::ErrorKind::NotFound || e.raw_os_error() == Some(20)
}

#[cfg(unix)]
fn write_symlink(path: &Path, target: &[u8]) -> io::Result<()> {
    use std::os::unix::ffi::OsStrExt;
    std::os::unix::fs::symlink(std::ffi::OsStr::from_bytes(target), path)
}

#[cfg(not(unix))]
fn write_symlink(path: &Path, target: &[u8]) -> io::Result<()> {
    fs::write(path, target)
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: FileMode) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode.permissions()))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: FileMode) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worktree() -> (tempfile::TempDir, WorkTree) {
        let dir = tempfile::tempdir().unwrap();
        let wt = WorkTree::new(dir.path(), HashAlgorithm::Sha1, true);
        (dir, wt)
    }

    #[test]
    fn write_creates_parents_and_remove_prunes_them() {
        let (dir, wt) = worktree();
        wt.write_file(b"a/b/c.txt".as_bstr(), b"hi\n", FileMode::Regular)
            .unwrap();
        assert!(wt.file_exists(b"a/b/c.txt".as_bstr()));
        assert_eq!(wt.read_file(b"a/b/c.txt".as_bstr()).unwrap(), b"hi\n");

        wt.remove_file(b"a/b/c.txt".as_bstr()).unwrap();
        assert!(!dir.path().join("a").exists());
        assert!(dir.path().exists());
        // Removing twice is fine.
        wt.remove_file(b"a/b/c.txt".as_bstr()).unwrap();
    }

    #[test]
    fn rejects_paths_escaping_the_tree() {
        let (_dir, wt) = worktree();
        assert!(wt.write_file(b"../x".as_bstr(), b"", FileMode::Regular).is_err());
        assert!(wt.write_file(b".git/config".as_bstr(), b"", FileMode::Regular).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn modes_are_applied() {
        let (_dir, wt) = worktree();
        wt.write_file(b"run".as_bstr(), b"#!/bin/sh\n", FileMode::Executable)
            .unwrap();
        wt.write_file(b"link".as_bstr(), b"run", FileMode::Symlink)
            .unwrap();

        let meta = wt.lstat(b"run".as_bstr()).unwrap().unwrap();
        assert_eq!(wt.mode_for(&meta, FileMode::Regular), FileMode::Executable);
        let meta = wt.lstat(b"link".as_bstr()).unwrap().unwrap();
        assert_eq!(wt.mode_for(&meta, FileMode::Regular), FileMode::Symlink);
        assert_eq!(wt.read_file(b"link".as_bstr()).unwrap(), b"run");
    }

    #[test]
    fn refresh_reports_changed_files_only() {
        let (_dir, wt) = worktree();
        let algo = HashAlgorithm::Sha1;
        let mut index = Index::new(algo);
        for (path, data) in [("same", b"s".as_slice()), ("edited", b"e".as_slice())] {
            let oid = Hasher::hash_object(algo, "blob", data).unwrap();
            wt.write_file(path.into(), data, FileMode::Regular).unwrap();
            // No stat data: forces a content comparison.
            index.add(IndexEntry::new(path, FileMode::Regular, oid));
        }
        let oid = Hasher::hash_object(algo, "blob", b"m").unwrap();
        index.add(IndexEntry::new("missing", FileMode::Regular, oid));
        wt.write_file(b"edited".as_bstr(), b"changed", FileMode::Regular)
            .unwrap();

        let stale = wt.refresh(&mut index).unwrap();
        assert_eq!(stale, vec![BString::from("edited"), BString::from("missing")]);
        let same = index.get(b"same".as_bstr(), Stage::Normal).unwrap();
        assert_ne!(same.stat, StatData::default());
        assert!(!wt.is_modified(same).unwrap());
    }
}
