//! Turning revision arguments into object ids, and reading/writing refs.

use std::fs;
use std::path::PathBuf;

use octo_hash::{hex, ObjectId};
use octo_utils::lockfile::LockFile;

use crate::{RepoError, Repository};

/// Expansion order for short ref names.
const REF_RULES: &[&str] = &[
    "{}",
    "refs/{}",
    "refs/tags/{}",
    "refs/heads/{}",
    "refs/remotes/{}",
    "refs/remotes/{}/HEAD",
];

const MAX_SYMREF_DEPTH: usize = 5;

impl Repository {
    /// Resolve a full hex id, a ref name (short or full), or a unique
    /// abbreviated id of at least four hex digits.
    pub fn resolve_revision(&self, spec: &str) -> Result<ObjectId, RepoError> {
        if spec.len() == self.hash_algo.hex_len() && hex::is_hex(spec) {
            return Ok(ObjectId::from_hex(spec)?);
        }
        if is_valid_ref_name(spec) {
            for rule in REF_RULES {
                if let Some(oid) = self.read_ref(&rule.replace("{}", spec))? {
                    return Ok(oid);
                }
            }
        }
        if spec.len() >= 4 && hex::is_hex(spec) {
            if let Some(oid) = self.odb.resolve_prefix(spec)? {
                return Ok(oid);
            }
        }
        Err(RepoError::BadRevision(spec.to_string()))
    }

    /// Value of `HEAD`, `None` on an unborn branch.
    pub fn head_oid(&self) -> Result<Option<ObjectId>, RepoError> {
        self.read_ref("HEAD")
    }

    /// Read a ref, following symbolic refs. Loose refs shadow `packed-refs`.
    pub fn read_ref(&self, name: &str) -> Result<Option<ObjectId>, RepoError> {
        let mut name = name.to_string();
        for _ in 0..MAX_SYMREF_DEPTH {
            if !is_valid_ref_name(&name) {
                return Ok(None);
            }
            let path = self.ref_path(&name);
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound || path.is_dir() => {
                    return self.read_packed_ref(&name);
                }
                Err(e) => return Err(e.into()),
            };
            let content = content.trim();
            match content.strip_prefix("ref:") {
                Some(target) => name = target.trim().to_string(),
                None => {
                    return ObjectId::from_hex(content).map(Some).map_err(|_| {
                        RepoError::InvalidRef {
                            name,
                            reason: format!("bad content '{content}'"),
                        }
                    })
                }
            }
        }
        Err(RepoError::InvalidRef {
            name,
            reason: "symbolic ref loop".into(),
        })
    }

    /// Point `name` at `oid`, writing through the symbolic target when
    /// `name` is a symbolic ref.
    pub fn update_ref(&self, name: &str, oid: &ObjectId) -> Result<(), RepoError> {
        let mut name = name.to_string();
        for _ in 0..MAX_SYMREF_DEPTH {
            match fs::read_to_string(self.ref_path(&name)) {
                Ok(c) if c.starts_with("ref:") => {
                    name = c["ref:".len()..].trim().to_string();
                    continue;
                }
                _ => break,
            }
        }
        if !is_valid_ref_name(&name) {
            return Err(RepoError::InvalidRef {
                name,
                reason: "not a valid ref name".into(),
            });
        }
        let path = self.ref_path(&name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut lock = LockFile::acquire(&path)?;
        lock.write_contents(format!("{oid}\n").as_bytes())?;
        lock.commit()?;
        tracing::debug!(%name, %oid, "updated ref");
        Ok(())
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.git_dir.join(name)
    }

    fn read_packed_ref(&self, name: &str) -> Result<Option<ObjectId>, RepoError> {
        let content = match fs::read_to_string(self.git_dir.join("packed-refs")) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        for line in content.lines() {
            if line.starts_with('#') || line.starts_with('^') {
                continue;
            }
            if let Some((hex, refname)) = line.split_once(' ') {
                if refname.trim() == name {
                    return Ok(Some(ObjectId::from_hex(hex)?));
                }
            }
        }
        Ok(None)
    }
}

/// Conservative subset of git's ref name rules, enough to keep lookups
/// inside the git directory.
fn is_valid_ref_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !name.ends_with('/')
        && !name.ends_with(".lock")
        && !name.contains("..")
        && !name.contains("//")
        && !name.contains("@{")
        && !name
            .bytes()
            .any(|b| b < 0x20 || b == 0x7f || b" ~^:?*[\\".contains(&b))
}
