//! Per-path resolution of unmerged index entries.
//!
//! A [`PathResolver`] receives the (up to) three sides of one unmerged path
//! and either leaves the path merged at stage 0 or reports why it could not.
//! [`ContentResolver`] does the work in-process; [`ProgramResolver`] hands
//! it to an external merge program.

use std::path::PathBuf;
use std::process::ExitStatus;

use bstr::{BStr, BString, ByteSlice};
use octo_hash::ObjectId;
use octo_index::{Index, IndexEntry, Stage};
use octo_object::{FileMode, ObjectType};
use octo_odb::ObjectDatabase;
use octo_repo::WorkTree;
use octo_utils::path::verify_path;
use octo_utils::subprocess::ProgramCommand;

use crate::content::{merge_content, MergeLabels};
use crate::MergeOptions;

/// One side of an unmerged path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Side {
    pub oid: ObjectId,
    pub mode: FileMode,
}

impl Side {
    pub fn new(oid: ObjectId, mode: FileMode) -> Self {
        Self { oid, mode }
    }
}

/// Base, ours and theirs for one path; absent sides did not have the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sides {
    pub base: Option<Side>,
    pub ours: Option<Side>,
    pub theirs: Option<Side>,
}

impl Sides {
    /// Bucket a path's staged entries by stage. Stage-0 entries are ignored.
    pub fn from_entries<'e>(entries: impl IntoIterator<Item = &'e IndexEntry>) -> Self {
        let mut sides = Self::default();
        for e in entries {
            let side = Some(Side::new(e.oid, e.mode));
            match e.stage {
                Stage::Base => sides.base = side,
                Stage::Ours => sides.ours = side,
                Stage::Theirs => sides.theirs = side,
                Stage::Normal => {}
            }
        }
        sides
    }
}

/// Broad class of a per-path failure, for tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    Permission,
    Content,
    Overwrite,
    Unsupported,
    Internal,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permission => "permission",
            Self::Content => "content",
            Self::Overwrite => "overwrite",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal",
        }
    }
}

/// Why a path was left unresolved.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("File {path} deleted on one branch but had its permissions changed on the other.")]
    DeletedWithModeChange { path: BString },

    #[error("File {path} added identically in both branches, but permissions conflict {ours:o}->{theirs:o}.")]
    AddedWithModeConflict { path: BString, ours: u32, theirs: u32 },

    #[error("permission conflict: {base:o}->{ours:o},{theirs:o} in {path}")]
    PermissionConflict {
        path: BString,
        base: u32,
        ours: u32,
        theirs: u32,
    },

    #[error("content conflict in {path}")]
    ContentConflict { path: BString },

    #[error("untracked {path} is overwritten by the merge.")]
    OverwriteConflict { path: BString },

    #[error("{path}: Not merging symbolic link changes.")]
    SymlinkChange { path: BString },

    #[error("{path}: Not merging conflicting submodule changes.")]
    SubmoduleChange { path: BString },

    #[error("{path}: Not handling case {base} -> {ours} -> {theirs}")]
    UnsupportedCase {
        path: BString,
        base: String,
        ours: String,
        theirs: String,
    },

    #[error("{path}: cannot remove from the index")]
    IndexRemoval { path: BString },

    #[error("Invalid path '{path}'")]
    InvalidPath { path: BString },

    #[error("merge program '{command}' failed ({status})")]
    ProgramFailed { command: String, status: ExitStatus },

    #[error(transparent)]
    Odb(#[from] octo_odb::OdbError),

    #[error(transparent)]
    Repo(#[from] octo_repo::RepoError),

    #[error(transparent)]
    Util(#[from] octo_utils::UtilError),
}

impl ResolveError {
    pub fn kind(&self) -> ConflictKind {
        match self {
            Self::DeletedWithModeChange { .. }
            | Self::AddedWithModeConflict { .. }
            | Self::PermissionConflict { .. } => ConflictKind::Permission,
            Self::ContentConflict { .. } | Self::ProgramFailed { .. } => ConflictKind::Content,
            Self::OverwriteConflict { .. } => ConflictKind::Overwrite,
            Self::SymlinkChange { .. } | Self::SubmoduleChange { .. } | Self::UnsupportedCase { .. } => {
                ConflictKind::Unsupported
            }
            Self::IndexRemoval { .. }
            | Self::InvalidPath { .. }
            | Self::Odb(_)
            | Self::Repo(_)
            | Self::Util(_) => ConflictKind::Internal,
        }
    }
}

/// Resolves a single unmerged path.
pub trait PathResolver {
    /// On success the path must be merged in `index` (one stage-0 entry) or
    /// gone from it. On failure the path's stages are left in place.
    fn resolve(&mut self, index: &mut Index, path: &BStr, sides: &Sides) -> Result<(), ResolveError>;
}

impl<R: PathResolver + ?Sized> PathResolver for &mut R {
    fn resolve(&mut self, index: &mut Index, path: &BStr, sides: &Sides) -> Result<(), ResolveError> {
        (**self).resolve(index, path, sides)
    }
}

/// Which of the merge-one-file cases a path falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    /// Deleted on one side and unchanged on the other, or deleted on both.
    Deleted {
        base: Side,
        ours: Option<Side>,
        theirs: Option<Side>,
    },
    AddedByUs(Side),
    AddedByThem(Side),
    /// Both added the same content; modes may still differ.
    AddedIdentically { ours: Side, theirs: Side },
    /// Both sides have the file and it needs a content merge.
    Modified {
        base: Option<Side>,
        ours: Side,
        theirs: Side,
    },
    Unhandled,
}

/// Classify `sides`. Sides are compared by object id only; mode differences
/// are judged by the resolution itself.
pub fn classify(sides: &Sides) -> Case {
    match (sides.base, sides.ours, sides.theirs) {
        (Some(base), ours, theirs) if deleted_cleanly(base, ours, theirs) => {
            Case::Deleted { base, ours, theirs }
        }
        (None, Some(ours), None) => Case::AddedByUs(ours),
        (None, None, Some(theirs)) => Case::AddedByThem(theirs),
        (None, Some(ours), Some(theirs)) if ours.oid == theirs.oid => {
            Case::AddedIdentically { ours, theirs }
        }
        (base, Some(ours), Some(theirs)) => Case::Modified { base, ours, theirs },
        _ => Case::Unhandled,
    }
}

fn deleted_cleanly(base: Side, ours: Option<Side>, theirs: Option<Side>) -> bool {
    match (ours, theirs) {
        (None, None) => true,
        (Some(kept), None) | (None, Some(kept)) => kept.oid == base.oid,
        (Some(_), Some(_)) => false,
    }
}

/// The in-process resolver: trivial cases by classification, everything
/// else by a textual three-way merge written into the working tree.
pub struct ContentResolver<'a> {
    odb: &'a ObjectDatabase,
    worktree: &'a WorkTree,
    options: MergeOptions,
}

impl<'a> ContentResolver<'a> {
    pub fn new(odb: &'a ObjectDatabase, worktree: &'a WorkTree, options: MergeOptions) -> Self {
        Self {
            odb,
            worktree,
            options,
        }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    fn remove(
        &self,
        index: &mut Index,
        path: &BStr,
        base: Side,
        ours: Option<Side>,
        theirs: Option<Side>,
    ) -> Result<(), ResolveError> {
        let mode_changed = |side: Option<Side>| side.is_some_and(|s| s.mode != base.mode);
        if mode_changed(ours) || mode_changed(theirs) {
            return Err(ResolveError::DeletedWithModeChange { path: path.to_owned() });
        }

        if ours.is_some() {
            tracing::info!("Removing {path}");
            if self.worktree.file_exists(path) {
                self.worktree.remove_file(path)?;
            }
        }
        if !index.remove_path(path) {
            return Err(ResolveError::IndexRemoval { path: path.to_owned() });
        }
        Ok(())
    }

    /// Record `side` as the merged state of `path`.
    fn add_cacheinfo(&self, index: &mut Index, path: &BStr, side: Side) -> Result<(), ResolveError> {
        verify_path(path).map_err(|_| ResolveError::InvalidPath { path: path.to_owned() })?;
        let entry = index.add_resolved(path, side.mode, side.oid);
        entry.flags.assume_valid = self.options.assume_unchanged;
        Ok(())
    }

    /// Write the stage-0 entry of `path` to the working tree.
    fn checkout(&self, index: &mut Index, path: &BStr) -> Result<(), ResolveError> {
        let Some(entry) = index.get_mut(path, Stage::Normal) else {
            return Err(ResolveError::InvalidPath { path: path.to_owned() });
        };
        let blob = self.odb.read_blob(&entry.oid)?;
        entry.stat = self.worktree.write_file(path, &blob.data, entry.mode)?;
        Ok(())
    }

    fn merge_file(
        &self,
        index: &mut Index,
        path: &BStr,
        base: Option<Side>,
        ours: Side,
        theirs: Side,
    ) -> Result<(), ResolveError> {
        if ours.mode.is_symlink() || theirs.mode.is_symlink() {
            return Err(ResolveError::SymlinkChange { path: path.to_owned() });
        }
        if ours.mode.is_gitlink() || theirs.mode.is_gitlink() {
            return Err(ResolveError::SubmoduleChange { path: path.to_owned() });
        }

        let ours_data = self.odb.read_blob(&ours.oid)?.data;
        let theirs_data = self.odb.read_blob(&theirs.oid)?.data;
        let base_data = match base {
            Some(b) => {
                tracing::info!("Auto-merging {path}");
                self.odb.read_blob(&b.oid)?.data
            }
            None => {
                tracing::info!("Added {path} in both, but differently.");
                Vec::new()
            }
        };

        let labels = MergeLabels {
            base: "orig",
            ours: "our",
            theirs: "their",
        };
        let result = merge_content(
            &base_data,
            &ours_data,
            &theirs_data,
            self.options.conflict_style,
            &labels,
        );
        let clean = result.is_clean() && base.is_some();
        let merged = result.into_content();
        let stat = self.worktree.write_file(path, &merged, ours.mode)?;

        let content_conflict = (!clean).then(|| ResolveError::ContentConflict { path: path.to_owned() });
        if ours.mode != theirs.mode {
            if let Some(err) = &content_conflict {
                tracing::error!("{err}");
            }
            return Err(ResolveError::PermissionConflict {
                path: path.to_owned(),
                base: base.map_or(0, |b| b.mode.raw()),
                ours: ours.mode.raw(),
                theirs: theirs.mode.raw(),
            });
        }
        if let Some(err) = content_conflict {
            return Err(err);
        }

        let oid = self.odb.write_raw(ObjectType::Blob, &merged)?;
        let entry = index.add_resolved(path, ours.mode, oid);
        entry.stat = stat;
        entry.flags.assume_valid = self.options.assume_unchanged;
        Ok(())
    }
}

impl PathResolver for ContentResolver<'_> {
    fn resolve(&mut self, index: &mut Index, path: &BStr, sides: &Sides) -> Result<(), ResolveError> {
        match classify(sides) {
            Case::Deleted { base, ours, theirs } => self.remove(index, path, base, ours, theirs),
            Case::AddedByUs(ours) => self.add_cacheinfo(index, path, ours),
            Case::AddedByThem(theirs) => {
                tracing::info!("Adding {path}");
                if self.worktree.file_exists(path) {
                    return Err(ResolveError::OverwriteConflict { path: path.to_owned() });
                }
                self.add_cacheinfo(index, path, theirs)?;
                self.checkout(index, path)
            }
            Case::AddedIdentically { ours, theirs } => {
                if ours.mode != theirs.mode {
                    return Err(ResolveError::AddedWithModeConflict {
                        path: path.to_owned(),
                        ours: ours.mode.raw(),
                        theirs: theirs.mode.raw(),
                    });
                }
                tracing::info!("Adding {path}");
                self.add_cacheinfo(index, path, ours)?;
                self.checkout(index, path)
            }
            Case::Modified { base, ours, theirs } => self.merge_file(index, path, base, ours, theirs),
            Case::Unhandled => {
                let hex = |s: Option<Side>| s.map(|s| s.oid.to_hex()).unwrap_or_default();
                Err(ResolveError::UnsupportedCase {
                    path: path.to_owned(),
                    base: hex(sides.base),
                    ours: hex(sides.ours),
                    theirs: hex(sides.theirs),
                })
            }
        }
    }
}

/// Runs an external merge program once per path as
/// `<program> <base> <ours> <theirs> <path> <base-mode> <ours-mode> <theirs-mode>`.
///
/// Absent sides are passed as an empty id and mode `0`. The program works
/// on the repository itself; the in-memory index is not touched.
#[derive(Debug, Clone)]
pub struct ProgramResolver {
    program: String,
    work_dir: PathBuf,
}

impl ProgramResolver {
    pub fn new(program: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            work_dir: work_dir.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, path: &BStr, sides: &Sides) -> ProgramCommand {
        let hex = |s: Option<Side>| s.map(|s| s.oid.to_hex()).unwrap_or_default();
        let mode = |s: Option<Side>| format!("{:o}", s.map_or(0, |s| s.mode.raw()));
        ProgramCommand::new(&self.program)
            .arg(hex(sides.base))
            .arg(hex(sides.ours))
            .arg(hex(sides.theirs))
            .arg(path.to_os_str_lossy())
            .arg(mode(sides.base))
            .arg(mode(sides.ours))
            .arg(mode(sides.theirs))
            .working_dir(&self.work_dir)
    }
}

impl PathResolver for ProgramResolver {
    fn resolve(&mut self, _index: &mut Index, path: &BStr, sides: &Sides) -> Result<(), ResolveError> {
        let command = self.command(path, sides);
        let status = command.status()?;
        if status.success() {
            Ok(())
        } else {
            Err(ResolveError::ProgramFailed {
                command: command.command_line(),
                status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use octo_hash::HashAlgorithm;

    fn oid(n: u8) -> ObjectId {
        ObjectId::from_bytes(&[n; 20], HashAlgorithm::Sha1).unwrap()
    }

    fn side(n: u8) -> Option<Side> {
        Some(Side::new(oid(n), FileMode::Regular))
    }

    fn sides(base: Option<Side>, ours: Option<Side>, theirs: Option<Side>) -> Sides {
        Sides { base, ours, theirs }
    }

    #[test]
    fn deletions() {
        assert!(matches!(classify(&sides(side(1), side(1), None)), Case::Deleted { .. }));
        assert!(matches!(classify(&sides(side(1), None, side(1))), Case::Deleted { .. }));
        assert!(matches!(classify(&sides(side(1), None, None)), Case::Deleted { .. }));
        // Deleted on one side, modified on the other.
        assert!(matches!(
            classify(&sides(side(1), side(2), None)),
            Case::Unhandled
        ));
    }

    #[test]
    fn additions() {
        assert_eq!(
            classify(&sides(None, side(2), None)),
            Case::AddedByUs(Side::new(oid(2), FileMode::Regular))
        );
        assert!(matches!(classify(&sides(None, None, side(3))), Case::AddedByThem(_)));
        assert!(matches!(
            classify(&sides(None, side(4), side(4))),
            Case::AddedIdentically { .. }
        ));
        assert!(matches!(
            classify(&sides(None, side(4), side(5))),
            Case::Modified { base: None, .. }
        ));
    }

    #[test]
    fn modifications() {
        assert!(matches!(
            classify(&sides(side(1), side(2), side(3))),
            Case::Modified { base: Some(_), .. }
        ));
        // Same content on all three sides still goes through the merge.
        assert!(matches!(
            classify(&sides(side(1), side(1), side(1))),
            Case::Modified { .. }
        ));
        assert_eq!(classify(&Sides::default()), Case::Unhandled);
    }

    #[test]
    fn sides_from_staged_entries() {
        let entries = vec![
            IndexEntry::staged("f", FileMode::Regular, oid(1), Stage::Base),
            IndexEntry::staged("f", FileMode::Executable, oid(3), Stage::Theirs),
        ];
        let s = Sides::from_entries(&entries);
        assert_eq!(s.base, side(1));
        assert_eq!(s.ours, None);
        assert_eq!(s.theirs, Some(Side::new(oid(3), FileMode::Executable)));
    }

    #[test]
    fn error_messages_match_git() {
        let err = ResolveError::PermissionConflict {
            path: "f".into(),
            base: 0o100644,
            ours: 0o100644,
            theirs: 0o100755,
        };
        assert_eq!(err.to_string(), "permission conflict: 100644->100644,100755 in f");
        assert_eq!(err.kind(), ConflictKind::Permission);

        let err = ResolveError::UnsupportedCase {
            path: "f".into(),
            base: "aa".into(),
            ours: String::new(),
            theirs: "bb".into(),
        };
        assert_eq!(err.to_string(), "f: Not handling case aa ->  -> bb");
        assert_eq!(err.kind(), ConflictKind::Unsupported);
    }

    #[test]
    fn program_arguments_use_empty_ids_and_zero_modes() {
        let resolver = ProgramResolver::new("merge-driver", "/work");
        let s = sides(None, side(2), Some(Side::new(oid(3), FileMode::Executable)));
        let line = resolver.command("dir/f".into(), &s).command_line();
        assert_eq!(
            line,
            format!(
                "merge-driver  {} {} dir/f 0 100644 100755",
                oid(2).to_hex(),
                oid(3).to_hex()
            )
        );
    }
}
