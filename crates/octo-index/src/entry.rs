//! Index entry types: IndexEntry, StatData, EntryFlags.

use bstr::BString;
use octo_hash::ObjectId;
use octo_object::FileMode;

use crate::Stage;

/// One (path, stage) record of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: BString,
    pub oid: ObjectId,
    pub mode: FileMode,
    pub stage: Stage,
    pub stat: StatData,
    pub flags: EntryFlags,
}

impl IndexEntry {
    /// A stage-0 entry with no cached stat data.
    pub fn new(path: impl Into<BString>, mode: FileMode, oid: ObjectId) -> Self {
        Self::staged(path, mode, oid, Stage::Normal)
    }

    pub fn staged(path: impl Into<BString>, mode: FileMode, oid: ObjectId, stage: Stage) -> Self {
        Self {
            path: path.into(),
            oid,
            mode,
            stage,
            stat: StatData::default(),
            flags: EntryFlags::default(),
        }
    }

    /// Same content and mode, ignoring stat data and flags.
    pub fn same_content(&self, mode: FileMode, oid: &ObjectId) -> bool {
        self.mode == mode && self.oid == *oid
    }
}

/// File system stat data cached in the index, truncated to 32 bits as on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatData {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

impl StatData {
    #[cfg(unix)]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            ctime_secs: meta.ctime() as u32,
            ctime_nsecs: meta.ctime_nsec() as u32,
            mtime_secs: meta.mtime() as u32,
            mtime_nsecs: meta.mtime_nsec() as u32,
            dev: meta.dev() as u32,
            ino: meta.ino() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            size: meta.len() as u32,
        }
    }

    #[cfg(not(unix))]
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .unwrap_or_default();
        Self {
            ctime_secs: mtime.as_secs() as u32,
            ctime_nsecs: mtime.subsec_nanos(),
            mtime_secs: mtime.as_secs() as u32,
            mtime_nsecs: mtime.subsec_nanos(),
            size: meta.len() as u32,
            ..Self::default()
        }
    }

    /// Whether the cached stat still describes the file behind `meta`.
    ///
    /// An all-zero record (never checked out) never matches.
    pub fn matches(&self, meta: &std::fs::Metadata) -> bool {
        if *self == Self::default() {
            return false;
        }
        let now = Self::from_metadata(meta);
        self.size == now.size
            && self.mtime_secs == now.mtime_secs
            && self.mtime_nsecs == now.mtime_nsecs
            && self.ctime_secs == now.ctime_secs
            && self.ctime_nsecs == now.ctime_nsecs
            && self.ino == now.ino
            && self.dev == now.dev
    }
}

/// Per-entry flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags {
    /// "Assume unchanged": the working tree file is not examined.
    pub assume_valid: bool,
    pub intent_to_add: bool,
    pub skip_worktree: bool,
}

impl EntryFlags {
    /// Extended flags need a version 3 index.
    pub fn has_extended(&self) -> bool {
        self.intent_to_add || self.skip_worktree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_stat_never_matches() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"data").unwrap();
        let meta = std::fs::symlink_metadata(&file).unwrap();

        assert!(!StatData::default().matches(&meta));
        assert!(StatData::from_metadata(&meta).matches(&meta));
    }

    #[test]
    fn size_change_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"data").unwrap();
        let stat = StatData::from_metadata(&std::fs::symlink_metadata(&file).unwrap());
        std::fs::write(&file, b"longer data").unwrap();
        assert!(!stat.matches(&std::fs::symlink_metadata(&file).unwrap()));
    }

    #[test]
    fn extended_flags() {
        assert!(!EntryFlags::default().has_extended());
        let flags = EntryFlags {
            skip_worktree: true,
            ..Default::default()
        };
        assert!(flags.has_extended());
    }
}
