use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{LockError, UtilError};
use crate::Result;

const LOCK_SUFFIX: &str = ".lock";

/// Exclusive `<path>.lock` guard.
///
/// The lock file is created with create-exclusive semantics, receives the new
/// contents, and replaces the target by rename on [`LockFile::commit`]. A guard
/// that is dropped without committing removes its lock file, so a failed
/// operation never leaves the target locked.
#[derive(Debug)]
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
    done: bool,
}

impl LockFile {
    /// Take the lock for `target`. Fails with [`LockError::AlreadyLocked`] when
    /// another holder owns it.
    pub fn acquire(target: impl AsRef<Path>) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let lock_path = lock_path_for(&target);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .map_err(|source| {
                let err = if source.kind() == io::ErrorKind::AlreadyExists {
                    LockError::AlreadyLocked {
                        path: lock_path.clone(),
                    }
                } else {
                    LockError::Create {
                        path: lock_path.clone(),
                        source,
                    }
                };
                UtilError::Lock(err)
            })?;

        tracing::debug!(lock = %lock_path.display(), "acquired lock");
        Ok(Self {
            target,
            lock_path,
            file: Some(file),
            done: false,
        })
    }

    /// Like [`LockFile::acquire`], but reports contention as `Ok(None)`.
    pub fn try_acquire(target: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::acquire(target) {
            Ok(lock) => Ok(Some(lock)),
            Err(UtilError::Lock(LockError::AlreadyLocked { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Replace whatever was written so far with `contents`.
    pub fn write_contents(&mut self, contents: &[u8]) -> Result<()> {
        let file = self.open_file()?;
        file.set_len(0)?;
        io::Seek::rewind(file)?;
        file.write_all(contents)?;
        Ok(())
    }

    /// Flush, sync and rename the lock file over the target.
    pub fn commit(mut self) -> Result<()> {
        let commit_err = |path: &Path, source: io::Error| {
            UtilError::Lock(LockError::Commit {
                path: path.to_path_buf(),
                source,
            })
        };

        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| commit_err(&self.lock_path, e))?;
            file.sync_all().map_err(|e| commit_err(&self.lock_path, e))?;
        }
        fs::rename(&self.lock_path, &self.target).map_err(|e| commit_err(&self.lock_path, e))?;

        self.done = true;
        tracing::debug!(target = %self.target.display(), "committed lock");
        Ok(())
    }

    /// Discard the lock without touching the target.
    pub fn rollback(mut self) -> Result<()> {
        self.file.take();
        self.done = true;
        match fs::remove_file(&self.lock_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn open_file(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("lock file already closed"))
    }
}

impl Write for LockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.open_file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.open_file()?.flush()
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.done {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}
