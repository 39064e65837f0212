//! Repository discovery, initialization, and central access for the merge
//! commands: object database, configuration, index location, refs and the
//! working tree.

pub mod config;
mod discover;
mod env;
mod error;
mod revision;
mod worktree;

pub use config::Config;
pub use env::EnvOverrides;
pub use error::RepoError;
pub use worktree::WorkTree;

use std::path::{Path, PathBuf};

use octo_hash::HashAlgorithm;
use octo_index::{Index, LockedIndex};
use octo_odb::ObjectDatabase;

use crate::discover::Located;

/// An opened repository.
pub struct Repository {
    git_dir: PathBuf,
    work_tree: Option<PathBuf>,
    odb: ObjectDatabase,
    config: Config,
    index_path: PathBuf,
    hash_algo: HashAlgorithm,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .field("work_tree", &self.work_tree)
            .field("hash_algo", &self.hash_algo)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Open the repository at `path`, either a git directory or a work tree root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();
        let located = if discover::is_git_dir(path) {
            discover::open_git_dir(path)?
        } else if path.join(".git").exists() {
            discover::discover(path)?
        } else {
            return Err(RepoError::NotFound(path.to_path_buf()));
        };
        Self::from_located(located, &EnvOverrides::default())
    }

    /// Find the repository containing `start`, honoring `GIT_DIR` and friends.
    pub fn discover(start: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::discover_with_env(start, &EnvOverrides::from_env())
    }

    pub fn discover_with_env(
        start: impl AsRef<Path>,
        env: &EnvOverrides,
    ) -> Result<Self, RepoError> {
        let located = match &env.git_dir {
            Some(git_dir) => {
                let mut located = discover::open_git_dir(&start.as_ref().join(git_dir))?;
                // An explicit GIT_DIR means the caller's directory is the work tree.
                if located.work_tree.is_none() {
                    located.work_tree = Some(std::fs::canonicalize(start.as_ref())?);
                }
                located
            }
            None => discover::discover(start.as_ref())?,
        };
        Self::from_located(located, env)
    }

    /// Create (or reuse) a repository with a work tree at `path`.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        Self::init_with_hash(path, HashAlgorithm::Sha1)
    }

    pub fn init_with_hash(path: impl AsRef<Path>, hash_algo: HashAlgorithm) -> Result<Self, RepoError> {
        let located = discover::init(path.as_ref(), hash_algo)?;
        Self::from_located(located, &EnvOverrides::default())
    }

    fn from_located(located: Located, env: &EnvOverrides) -> Result<Self, RepoError> {
        let Located { git_dir, work_tree } = located;
        let config = Config::load(&git_dir.join("config"))?;

        let hash_algo = match config.get_str("extensions.objectformat") {
            Some(name) => HashAlgorithm::from_name(name).ok_or_else(|| RepoError::InvalidGitDir {
                path: git_dir.clone(),
                reason: format!("unknown object format '{name}'"),
            })?,
            None => HashAlgorithm::Sha1,
        };

        let work_tree = match &env.work_tree {
            Some(wt) => Some(wt.clone()),
            None => work_tree,
        };
        let objects_dir = env
            .object_directory
            .clone()
            .unwrap_or_else(|| git_dir.join("objects"));
        let index_path = env
            .index_file
            .clone()
            .unwrap_or_else(|| octo_index::default_index_path(&git_dir));

        tracing::debug!(git_dir = %git_dir.display(), hash = %hash_algo, "opened repository");
        Ok(Self {
            odb: ObjectDatabase::open(objects_dir, hash_algo),
            git_dir,
            work_tree,
            config,
            index_path,
            hash_algo,
        })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn work_tree_path(&self) -> Option<&Path> {
        self.work_tree.as_deref()
    }

    pub fn odb(&self) -> &ObjectDatabase {
        &self.odb
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash_algo
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Read the index without locking it. A missing file is an unborn index.
    pub fn read_index(&self) -> Result<Index, RepoError> {
        Ok(Index::read_or_new(&self.index_path, self.hash_algo)?)
    }

    /// Lock and read the index.
    pub fn lock_index(&self) -> Result<LockedIndex, RepoError> {
        Ok(LockedIndex::acquire(&self.index_path, self.hash_algo)?)
    }

    /// Working tree handle; fails for bare repositories.
    pub fn worktree(&self) -> Result<WorkTree, RepoError> {
        let root = self.work_tree.as_ref().ok_or(RepoError::BareNoWorkTree)?;
        let trust_filemode = self.config.get_bool_or("core.filemode", true)?;
        Ok(WorkTree::new(root, self.hash_algo, trust_filemode))
    }
}
