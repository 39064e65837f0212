//! The index: a sorted list of (path, stage) entries plus the on-disk DIRC format.
//!
//! A path is either merged (one stage-0 entry) or unmerged (any of stages
//! 1, 2 and 3, each at most once). [`Index::add`] keeps that invariant.

pub mod entry;
mod lock;
mod read;
mod tree;
mod write;

use std::path::{Path, PathBuf};

use bstr::{BStr, BString, ByteSlice};
use octo_hash::{HashAlgorithm, ObjectId};
use octo_object::FileMode;
use octo_odb::OdbError;

pub use entry::{EntryFlags, IndexEntry, StatData};
pub use lock::LockedIndex;

/// Errors from reading, updating or writing the index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index file corrupt: {0}")]
    InvalidHeader(String),

    #[error("unsupported index version {0}")]
    UnsupportedVersion(u32),

    #[error("index entry at offset {offset} is invalid: {reason}")]
    InvalidEntry { offset: usize, reason: String },

    #[error("index uses {0:?} extension, which we do not understand")]
    UnsupportedExtension(String),

    #[error("index file checksum mismatch")]
    ChecksumMismatch,

    #[error("invalid stage {0}")]
    InvalidStage(u8),

    #[error("cannot write a tree from an unmerged index ({} unmerged path(s))", paths.len())]
    Unmerged { paths: Vec<BString> },

    #[error(transparent)]
    Lock(#[from] octo_utils::UtilError),

    #[error(transparent)]
    Odb(#[from] OdbError),

    #[error(transparent)]
    Hash(#[from] octo_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Merge stage of an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    /// Merged.
    #[default]
    Normal,
    /// Common ancestor version.
    Base,
    Ours,
    Theirs,
}

impl Stage {
    pub fn as_u8(self) -> u8 {
        match self {
            Stage::Normal => 0,
            Stage::Base => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    pub fn from_u8(v: u8) -> Result<Self, IndexError> {
        match v {
            0 => Ok(Stage::Normal),
            1 => Ok(Stage::Base),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            other => Err(IndexError::InvalidStage(other)),
        }
    }
}

/// An extension block kept verbatim across read and write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExtension {
    pub signature: [u8; 4],
    pub data: Vec<u8>,
}

/// In-memory index.
#[derive(Debug, Clone)]
pub struct Index {
    pub(crate) version: u32,
    pub(crate) entries: Vec<IndexEntry>,
    pub(crate) extensions: Vec<RawExtension>,
    pub(crate) hash_algo: HashAlgorithm,
    pub(crate) on_disk: bool,
}

impl Index {
    pub fn new(hash_algo: HashAlgorithm) -> Self {
        Self {
            version: 2,
            entries: Vec::new(),
            extensions: Vec::new(),
            hash_algo,
            on_disk: false,
        }
    }

    /// Read an index file.
    pub fn read_from(path: impl AsRef<Path>, hash_algo: HashAlgorithm) -> Result<Self, IndexError> {
        let file = std::fs::File::open(path.as_ref())?;
        if file.metadata()?.len() == 0 {
            return Err(IndexError::InvalidHeader("index file is empty".into()));
        }
        // SAFETY: the file is only read; writers replace it by rename, never in place.
        let data = unsafe { memmap2::Mmap::map(&file)? };
        let index = read::parse_index(&data, hash_algo)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            entries = index.entries.len(),
            "read index"
        );
        Ok(index)
    }

    /// Read `path`, or start an empty index when it does not exist.
    pub fn read_or_new(path: impl AsRef<Path>, hash_algo: HashAlgorithm) -> Result<Self, IndexError> {
        match Self::read_from(path.as_ref(), hash_algo) {
            Err(IndexError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::new(hash_algo))
            }
            other => other,
        }
    }

    /// Encode in the on-disk format, trailer included.
    pub fn serialize(&self) -> Result<Vec<u8>, IndexError> {
        write::serialize_index(self)
    }

    /// Write atomically through `<path>.lock`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        let data = self.serialize()?;
        let mut lock = octo_utils::lockfile::LockFile::acquire(path.as_ref())?;
        lock.write_contents(&data)?;
        lock.commit()?;
        Ok(())
    }

    /// True for an index that was never written and holds nothing.
    pub fn is_unborn(&self) -> bool {
        !self.on_disk && self.entries.is_empty()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash_algo
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry> {
        self.entries.iter()
    }

    pub fn extensions(&self) -> &[RawExtension] {
        &self.extensions
    }

    /// Binary search for `path`.
    ///
    /// `Ok(pos)` is the position of its stage-0 entry. `Err(pos)` is where a
    /// stage-0 entry would be inserted; any staged entries for `path` start
    /// there.
    pub fn name_pos(&self, path: &BStr) -> Result<usize, usize> {
        self.entry_pos(path, Stage::Normal)
    }

    fn entry_pos(&self, path: &BStr, stage: Stage) -> Result<usize, usize> {
        self.entries.binary_search_by(|e| {
            e.path
                .as_bstr()
                .cmp(path)
                .then_with(|| e.stage.cmp(&stage))
        })
    }

    pub fn get(&self, path: &BStr, stage: Stage) -> Option<&IndexEntry> {
        self.entry_pos(path, stage).ok().map(|i| &self.entries[i])
    }

    pub fn get_mut(&mut self, path: &BStr, stage: Stage) -> Option<&mut IndexEntry> {
        match self.entry_pos(path, stage) {
            Ok(i) => Some(&mut self.entries[i]),
            Err(_) => None,
        }
    }

    /// All entries for `path`, in stage order.
    pub fn stages(&self, path: &BStr) -> &[IndexEntry] {
        let start = match self.name_pos(path) {
            Ok(i) | Err(i) => i,
        };
        let len = self.entries[start..]
            .iter()
            .take_while(|e| e.path.as_bstr() == path)
            .count();
        &self.entries[start..start + len]
    }

    /// Insert or replace an entry.
    ///
    /// A stage-0 entry evicts the path's conflict stages; a staged entry
    /// evicts its stage-0 entry.
    pub fn add(&mut self, entry: IndexEntry) {
        if entry.stage == Stage::Normal {
            self.remove_stages(entry.path.as_bstr(), |s| s != Stage::Normal);
        } else {
            self.remove_stages(entry.path.as_bstr(), |s| s == Stage::Normal);
        }
        match self.entry_pos(entry.path.as_bstr(), entry.stage) {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
    }

    /// Record `path` as merged, dropping any conflict stages it had.
    ///
    /// Returns the new entry so callers can fill in stat data and flags.
    pub fn add_resolved(&mut self, path: &BStr, mode: FileMode, oid: ObjectId) -> &mut IndexEntry {
        self.add(IndexEntry::new(path.to_owned(), mode, oid));
        let pos = match self.name_pos(path) {
            Ok(i) | Err(i) => i,
        };
        &mut self.entries[pos]
    }

    /// Remove every entry for `path`. Returns whether anything was removed.
    pub fn remove_path(&mut self, path: &BStr) -> bool {
        let before = self.entries.len();
        self.remove_stages(path, |_| true);
        before != self.entries.len()
    }

    /// Remove a single (path, stage) entry.
    pub fn remove_entry(&mut self, path: &BStr, stage: Stage) -> Option<IndexEntry> {
        self.entry_pos(path, stage)
            .ok()
            .map(|i| self.entries.remove(i))
    }

    fn remove_stages(&mut self, path: &BStr, mut doomed: impl FnMut(Stage) -> bool) {
        let start = match self.name_pos(path) {
            Ok(i) | Err(i) => i,
        };
        let mut i = start;
        while i < self.entries.len() && self.entries[i].path.as_bstr() == path {
            if doomed(self.entries[i].stage) {
                self.entries.remove(i);
            } else {
                i += 1;
            }
        }
    }

    pub fn has_unmerged(&self) -> bool {
        self.entries.iter().any(|e| e.stage != Stage::Normal)
    }

    /// Distinct unmerged paths, in index order.
    pub fn unmerged_paths(&self) -> Vec<BString> {
        let mut paths: Vec<BString> = Vec::new();
        for e in self.entries.iter().filter(|e| e.stage != Stage::Normal) {
            if paths.last() != Some(&e.path) {
                paths.push(e.path.clone());
            }
        }
        paths
    }

    /// Replace the whole entry list, restoring index order.
    pub fn replace_entries(&mut self, mut entries: Vec<IndexEntry>) {
        entries.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.stage.cmp(&b.stage)));
        self.entries = entries;
    }

    /// Write tree objects for the stage-0 entries and return the root id.
    pub fn write_tree(&self, odb: &octo_odb::ObjectDatabase) -> Result<ObjectId, IndexError> {
        tree::write_tree(self, odb)
    }

    /// Paths whose stage-0 entry differs from `tree`, plus paths only one side has.
    pub fn changes_against_tree(
        &self,
        odb: &octo_odb::ObjectDatabase,
        tree: &ObjectId,
    ) -> Result<Vec<BString>, IndexError> {
        tree::changes_against_tree(self, odb, tree)
    }
}

/// `<git_dir>/index`.
pub fn default_index_path(git_dir: impl AsRef<Path>) -> PathBuf {
    git_dir.as_ref().join("index")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::from_bytes(&[n; 20], HashAlgorithm::Sha1).unwrap()
    }

    fn staged(path: &str, stage: Stage, n: u8) -> IndexEntry {
        IndexEntry::staged(path, FileMode::Regular, oid(n), stage)
    }

    #[test]
    fn entries_stay_sorted_by_path_then_stage() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        index.add(staged("b", Stage::Theirs, 3));
        index.add(staged("a", Stage::Normal, 1));
        index.add(staged("b", Stage::Base, 1));
        index.add(staged("b", Stage::Ours, 2));

        let keys: Vec<_> = index
            .iter()
            .map(|e| (e.path.to_string(), e.stage.as_u8()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a".into(), 0),
                ("b".into(), 1),
                ("b".into(), 2),
                ("b".into(), 3)
            ]
        );
    }

    #[test]
    fn name_pos_reports_stage_zero_or_insertion_point() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        index.add(staged("a", Stage::Normal, 1));
        index.add(staged("c", Stage::Ours, 2));
        index.add(staged("c", Stage::Theirs, 3));

        assert_eq!(index.name_pos(b"a".as_bstr()), Ok(0));
        assert_eq!(index.name_pos(b"c".as_bstr()), Err(1));
        assert_eq!(index.stages(b"c".as_bstr()).len(), 2);
        assert_eq!(index.name_pos(b"b".as_bstr()), Err(1));
        assert!(index.stages(b"b".as_bstr()).is_empty());
    }

    #[test]
    fn stage_zero_and_conflict_stages_are_exclusive() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        index.add(staged("f", Stage::Base, 1));
        index.add(staged("f", Stage::Ours, 2));
        assert!(index.has_unmerged());

        index.add(staged("f", Stage::Normal, 9));
        assert_eq!(index.len(), 1);
        assert!(!index.has_unmerged());

        index.add(staged("f", Stage::Theirs, 3));
        assert_eq!(index.len(), 1);
        assert_eq!(index.stages(b"f".as_bstr())[0].stage, Stage::Theirs);
    }

    #[test]
    fn unmerged_paths_are_distinct() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        index.add(staged("x", Stage::Base, 1));
        index.add(staged("x", Stage::Theirs, 1));
        index.add(staged("y", Stage::Normal, 1));
        index.add(staged("z", Stage::Ours, 1));
        assert_eq!(index.unmerged_paths(), vec![BString::from("x"), BString::from("z")]);
    }

    #[test]
    fn remove_path_drops_all_stages() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        index.add(staged("x", Stage::Base, 1));
        index.add(staged("x", Stage::Ours, 2));
        assert!(index.remove_path(b"x".as_bstr()));
        assert!(index.is_empty());
        assert!(!index.remove_path(b"x".as_bstr()));
    }

    #[test]
    fn add_resolved_replaces_conflict_stages() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        index.add(staged("f", Stage::Base, 1));
        index.add(staged("f", Stage::Ours, 2));
        index.add(staged("f", Stage::Theirs, 3));
        index.add(staged("g", Stage::Normal, 4));

        let entry = index.add_resolved(b"f".as_bstr(), FileMode::Executable, oid(7));
        entry.flags.assume_valid = true;

        assert_eq!(index.len(), 2);
        let f = index.get(b"f".as_bstr(), Stage::Normal).unwrap();
        assert_eq!(f.mode, FileMode::Executable);
        assert_eq!(f.oid, oid(7));
        assert!(f.flags.assume_valid);
        assert!(!index.has_unmerged());
    }

    #[test]
    fn unborn_until_read_or_filled() {
        let mut index = Index::new(HashAlgorithm::Sha1);
        assert!(index.is_unborn());
        index.add(staged("a", Stage::Normal, 1));
        assert!(!index.is_unborn());
    }
}
