//! Entry points behind `merge-one-file` and `merge-index`.

use bstr::{BStr, BString, ByteSlice};
use octo_index::{Index, Stage};
use octo_repo::Repository;

use crate::resolver::{ConflictKind, ContentResolver, PathResolver, ProgramResolver, Sides};
use crate::scanner::{ScanError, ScanMode, UnmergedScanner};
use crate::{MergeError, MergeOptions, MergeStatus};

/// The program `merge-index` runs for each unmerged path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeProgram {
    /// The built-in resolver, run in-process.
    OneFile,
    /// Any other program, run once per path.
    External(String),
}

impl MergeProgram {
    pub fn parse(name: &str) -> Self {
        match name {
            "merge-one-file" | "git-merge-one-file" => Self::OneFile,
            other => Self::External(other.to_owned()),
        }
    }
}

/// Which paths `merge-index` works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSelection {
    All,
    Paths(Vec<BString>),
}

/// Resolve one path from explicitly given sides, under the index lock.
///
/// The index is written only when the path resolves. A per-path conflict
/// is reported and yields [`MergeStatus::Conflicted`]; anything else is an
/// error.
pub fn merge_one_file(
    repo: &Repository,
    options: &MergeOptions,
    path: &BStr,
    sides: &Sides,
) -> Result<MergeStatus, MergeError> {
    let worktree = repo.worktree()?;
    let mut lock = repo.lock_index()?;
    let mut resolver = ContentResolver::new(repo.odb(), &worktree, options.clone());

    match resolver.resolve(lock.index_mut(), path, sides) {
        Ok(()) => {
            lock.commit()?;
            Ok(MergeStatus::Clean)
        }
        Err(err) if err.kind() == ConflictKind::Internal => Err(err.into()),
        Err(err) => {
            tracing::error!("{err}");
            lock.rollback()?;
            Ok(MergeStatus::Conflicted)
        }
    }
}

/// Run `program` over the unmerged paths in `selection`.
///
/// [`MergeProgram::OneFile`] resolves in-process under the index lock and
/// writes the index back. An external program is given each path in turn
/// and does its own index updates; the index is only read here.
///
/// Paths that are already merged are skipped. A named path the index does
/// not know at all is an error.
pub fn merge_index(
    repo: &Repository,
    options: &MergeOptions,
    program: &MergeProgram,
    selection: &PathSelection,
    mode: ScanMode,
) -> Result<MergeStatus, MergeError> {
    let worktree = repo.worktree()?;
    let failed = match program {
        MergeProgram::OneFile => {
            let mut lock = repo.lock_index()?;
            let resolver = ContentResolver::new(repo.odb(), &worktree, options.clone());
            let mut scanner = UnmergedScanner::new(resolver).quiet(options.quiet);
            let failed = run_selection(&mut scanner, lock.index_mut(), selection, mode)?;
            lock.commit()?;
            failed
        }
        MergeProgram::External(command) => {
            let mut index = repo.read_index()?;
            let resolver = ProgramResolver::new(command.as_str(), worktree.root());
            let mut scanner = UnmergedScanner::new(resolver).quiet(options.quiet);
            run_selection(&mut scanner, &mut index, selection, mode)?
        }
    };

    tracing::debug!(failed, "merge-index finished");
    Ok(if failed == 0 {
        MergeStatus::Clean
    } else {
        MergeStatus::Conflicted
    })
}

/// Number of paths that failed. A stopped scan counts as one.
fn run_selection<R: PathResolver>(
    scanner: &mut UnmergedScanner<R>,
    index: &mut Index,
    selection: &PathSelection,
    mode: ScanMode,
) -> Result<usize, MergeError> {
    let result = match selection {
        PathSelection::All => scanner.resolve_all(index, mode),
        PathSelection::Paths(paths) => resolve_paths(scanner, index, paths, mode),
    };
    match result {
        Ok(failed) => Ok(failed),
        Err(ScanError::ResolutionFailed { .. }) => Ok(1),
        Err(e) => Err(e.into()),
    }
}

fn resolve_paths<R: PathResolver>(
    scanner: &mut UnmergedScanner<R>,
    index: &mut Index,
    paths: &[BString],
    mode: ScanMode,
) -> Result<usize, ScanError> {
    let mut failed = 0;
    for path in paths {
        let path = path.as_bstr();
        if index.get(path, Stage::Normal).is_some() {
            continue;
        }
        match scanner.resolve_path(index, path) {
            Ok(_) => {}
            Err(ScanError::ResolutionFailed { .. }) if mode == ScanMode::KeepGoing => failed += 1,
            Err(e) => return Err(e),
        }
    }
    Ok(failed)
}
