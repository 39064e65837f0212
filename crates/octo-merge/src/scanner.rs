//! Walks the unmerged entries of an index and resolves them path by path.

use bstr::{BStr, BString, ByteSlice};
use octo_index::{Index, Stage};
use octo_utils::strmap::{KeyOwnership, StrIntMap};

use crate::resolver::{PathResolver, ResolveError, Sides};

/// What [`UnmergedScanner::resolve_all`] does when a path fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Return the first failure.
    StopAtFirstFailure,
    /// Count failures and scan the whole index.
    KeepGoing,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("{path} is not in the cache")]
    NotInIndex { path: BString },

    #[error("Merge program failed")]
    ResolutionFailed {
        path: BString,
        #[source]
        source: ResolveError,
    },
}

/// Feeds each unmerged path of an index to a [`PathResolver`].
pub struct UnmergedScanner<R> {
    resolver: R,
    quiet: bool,
    tally: StrIntMap<'static>,
}

impl<R: PathResolver> UnmergedScanner<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            quiet: false,
            tally: StrIntMap::new(KeyOwnership::Borrow, 0),
        }
    }

    /// Do not print `Merge program failed` for failed paths.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn into_resolver(self) -> R {
        self.resolver
    }

    /// Failures so far, keyed by [`ConflictKind`](crate::ConflictKind) name.
    pub fn tally(&self) -> &StrIntMap<'static> {
        &self.tally
    }

    /// Resolve the staged entries of `path` and return how many there were.
    ///
    /// A path with no staged entries, including one that is already merged,
    /// is [`ScanError::NotInIndex`].
    pub fn resolve_path(&mut self, index: &mut Index, path: &BStr) -> Result<usize, ScanError> {
        match index.name_pos(path) {
            Ok(_) => Err(ScanError::NotInIndex { path: path.to_owned() }),
            Err(pos) => self.resolve_at(index, pos, path),
        }
    }

    /// Resolve every unmerged path in index order. Returns the number of
    /// paths left unresolved, which is always zero for
    /// [`ScanMode::StopAtFirstFailure`].
    pub fn resolve_all(&mut self, index: &mut Index, mode: ScanMode) -> Result<usize, ScanError> {
        let mut failed = 0;
        let mut pos = 0;
        while pos < index.len() {
            let entry = &index.entries()[pos];
            if entry.stage == Stage::Normal {
                pos += 1;
                continue;
            }
            let path = entry.path.clone();
            match self.resolve_at(index, pos, path.as_bstr()) {
                Ok(_) => {}
                Err(ScanError::ResolutionFailed { .. }) if mode == ScanMode::KeepGoing => failed += 1,
                Err(e) => return Err(e),
            }
            // Resolution may have shrunk or removed the run, so look the
            // path up again instead of trusting the consumed count.
            pos = next_path_pos(index, path.as_bstr());
        }
        tracing::debug!(failed, "scanned unmerged entries");
        Ok(failed)
    }

    /// `pos` is where the staged entries of `path` start, if it has any.
    fn resolve_at(&mut self, index: &mut Index, pos: usize, path: &BStr) -> Result<usize, ScanError> {
        let run = &index.entries()[pos..];
        let found = run
            .iter()
            .take_while(|e| e.path.as_bstr() == path && e.stage != Stage::Normal)
            .count();
        if found == 0 {
            return Err(ScanError::NotInIndex { path: path.to_owned() });
        }
        let sides = Sides::from_entries(&run[..found]);

        match self.resolver.resolve(index, path, &sides) {
            Ok(()) => Ok(found),
            Err(source) => {
                tracing::error!("{source}");
                if !self.quiet {
                    tracing::error!("Merge program failed");
                }
                self.tally.incr(source.kind().as_str().as_bytes(), 1);
                Err(ScanError::ResolutionFailed {
                    path: path.to_owned(),
                    source,
                })
            }
        }
    }
}

/// First index position after every entry of `path`.
fn next_path_pos(index: &Index, path: &BStr) -> usize {
    match index.name_pos(path) {
        Ok(i) => i + 1,
        Err(i) => i + index.stages(path).len(),
    }
}
