//! Object database: loose objects on disk behind a small parsed-object cache.
//!
//! Besides raw reads and writes it offers the typed lookups the merge code
//! needs (`read_blob`, `read_tree`, `read_commit`) and peeling of tags and
//! commits down to trees.

mod cache;
mod loose;
mod prefix;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bstr::BString;
use octo_hash::{HashAlgorithm, HashError, ObjectId};
use octo_object::{Blob, Commit, FileMode, Object, ObjectError, ObjectType, Tree};

use crate::cache::ObjectCache;

/// Errors from object database operations.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("object {oid} is a {actual}, not a {expected}")]
    UnexpectedType {
        oid: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error("short object id {prefix} is ambiguous")]
    AmbiguousPrefix { prefix: String },

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

const CACHE_CAPACITY: usize = 1024;

/// A non-directory entry reached by walking a tree recursively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    /// Slash-separated path from the root tree.
    pub path: BString,
    pub mode: FileMode,
    pub oid: ObjectId,
}

/// Handle on a repository's `objects/` directory.
pub struct ObjectDatabase {
    objects_dir: PathBuf,
    hash_algo: HashAlgorithm,
    cache: Mutex<ObjectCache>,
}

impl ObjectDatabase {
    pub fn open(objects_dir: impl AsRef<Path>, hash_algo: HashAlgorithm) -> Self {
        Self {
            objects_dir: objects_dir.as_ref().to_path_buf(),
            hash_algo,
            cache: Mutex::new(ObjectCache::new(CACHE_CAPACITY)),
        }
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash_algo
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.cache().contains(oid)
            || loose::object_path(&self.objects_dir, oid).is_file()
            || self.hash_algo.empty_tree().is_ok_and(|empty| empty == *oid)
    }

    /// Read and parse an object. `Ok(None)` when it does not exist.
    pub fn read(&self, oid: &ObjectId) -> Result<Option<Object>, OdbError> {
        if let Some(obj) = self.cache().get(oid) {
            return Ok(Some(obj));
        }
        let Some((kind, content)) = loose::read(&self.objects_dir, oid)? else {
            // The empty tree exists in every repository, stored or not.
            if *oid == self.hash_algo.empty_tree()? {
                return Ok(Some(Object::Tree(Tree::default())));
            }
            return Ok(None);
        };
        let obj = Object::parse_content(kind, &content, self.hash_algo)?;
        self.cache().insert(*oid, obj.clone());
        Ok(Some(obj))
    }

    /// Read an object that must exist.
    pub fn read_existing(&self, oid: &ObjectId) -> Result<Object, OdbError> {
        self.read(oid)?.ok_or(OdbError::NotFound(*oid))
    }

    pub fn read_blob(&self, oid: &ObjectId) -> Result<Blob, OdbError> {
        match self.read_existing(oid)? {
            Object::Blob(blob) => Ok(blob),
            other => Err(unexpected(oid, ObjectType::Blob, &other)),
        }
    }

    pub fn read_tree(&self, oid: &ObjectId) -> Result<Tree, OdbError> {
        match self.read_existing(oid)? {
            Object::Tree(tree) => Ok(tree),
            other => Err(unexpected(oid, ObjectType::Tree, &other)),
        }
    }

    pub fn read_commit(&self, oid: &ObjectId) -> Result<Commit, OdbError> {
        match self.read_existing(oid)? {
            Object::Commit(commit) => Ok(commit),
            other => Err(unexpected(oid, ObjectType::Commit, &other)),
        }
    }

    /// Follow tags until a commit is reached.
    pub fn peel_to_commit(&self, oid: &ObjectId) -> Result<(ObjectId, Commit), OdbError> {
        let mut current = *oid;
        loop {
            match self.read_existing(&current)? {
                Object::Commit(commit) => return Ok((current, commit)),
                Object::Tag(tag) => current = tag.target,
                other => return Err(unexpected(&current, ObjectType::Commit, &other)),
            }
        }
    }

    /// Follow tags and commits until a tree is reached.
    pub fn peel_to_tree(&self, oid: &ObjectId) -> Result<ObjectId, OdbError> {
        let mut current = *oid;
        loop {
            match self.read_existing(&current)? {
                Object::Tree(_) => return Ok(current),
                Object::Commit(commit) => return Ok(commit.tree),
                Object::Tag(tag) => current = tag.target,
                other => return Err(unexpected(&current, ObjectType::Tree, &other)),
            }
        }
    }

    /// Every file below `tree`, sorted by path bytes (index order).
    pub fn flatten_tree(&self, tree: &ObjectId) -> Result<Vec<TreeFile>, OdbError> {
        let mut files = Vec::new();
        self.flatten_into(tree, &BString::default(), &mut files)?;
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn flatten_into(
        &self,
        tree: &ObjectId,
        prefix: &BString,
        files: &mut Vec<TreeFile>,
    ) -> Result<(), OdbError> {
        for entry in self.read_tree(tree)?.entries {
            let mut path = prefix.clone();
            if !path.is_empty() {
                path.push(b'/');
            }
            path.extend_from_slice(&entry.name);
            if entry.mode.is_tree() {
                self.flatten_into(&entry.oid, &path, files)?;
            } else {
                files.push(TreeFile {
                    path,
                    mode: entry.mode,
                    oid: entry.oid,
                });
            }
        }
        Ok(())
    }

    /// Store an object and return its id. Writing an existing object is a no-op.
    pub fn write(&self, obj: &Object) -> Result<ObjectId, OdbError> {
        self.write_raw(obj.object_type(), &obj.serialize_content())
    }

    pub fn write_raw(&self, kind: ObjectType, content: &[u8]) -> Result<ObjectId, OdbError> {
        loose::write(&self.objects_dir, self.hash_algo, kind, content)
    }

    /// Expand an abbreviated hex id to the unique loose object it names.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<Option<ObjectId>, OdbError> {
        prefix::resolve(&self.objects_dir, self.hash_algo, prefix)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, ObjectCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unexpected(oid: &ObjectId, expected: ObjectType, found: &Object) -> OdbError {
    OdbError::UnexpectedType {
        oid: *oid,
        expected,
        actual: found.object_type(),
    }
}
