use std::path::{Path, PathBuf};

use octo_hash::HashAlgorithm;
use octo_utils::lockfile::LockFile;

use crate::{Index, IndexError};

/// An index read under its lock.
///
/// The lock is taken before reading so no other writer can slip in between
/// the read and the write. Dropping without [`LockedIndex::commit`] leaves
/// the index file untouched.
#[derive(Debug)]
pub struct LockedIndex {
    lock: LockFile,
    index: Index,
}

impl LockedIndex {
    pub fn acquire(path: impl AsRef<Path>, hash_algo: HashAlgorithm) -> Result<Self, IndexError> {
        let lock = LockFile::acquire(path.as_ref())?;
        let index = Index::read_or_new(path.as_ref(), hash_algo)?;
        Ok(Self { lock, index })
    }

    pub fn path(&self) -> PathBuf {
        self.lock.target().to_path_buf()
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut Index {
        &mut self.index
    }

    /// Write the index and release the lock. Returns the written index.
    pub fn commit(mut self) -> Result<Index, IndexError> {
        let data = self.index.serialize()?;
        self.lock.write_contents(&data)?;
        self.lock.commit()?;
        self.index.on_disk = true;
        tracing::debug!(entries = self.index.len(), "wrote index");
        Ok(self.index)
    }

    pub fn rollback(self) -> Result<(), IndexError> {
        self.lock.rollback()?;
        Ok(())
    }
}
