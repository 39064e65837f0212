use std::fs;
use std::path::{Path, PathBuf};

use octo_hash::HashAlgorithm;

use crate::RepoError;

/// Where a repository lives, before its subsystems are opened.
#[derive(Debug)]
pub(crate) struct Located {
    pub git_dir: PathBuf,
    pub work_tree: Option<PathBuf>,
}

/// A directory with `HEAD`, `objects/` and `refs/`.
pub(crate) fn is_git_dir(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir() && path.join("refs").is_dir()
}

/// Walk up from `start` looking for `.git` or a bare repository.
pub(crate) fn discover(start: &Path) -> Result<Located, RepoError> {
    let start = fs::canonicalize(start).map_err(|_| RepoError::NotFound(start.to_path_buf()))?;
    let mut current = start.as_path();
    loop {
        let dot_git = current.join(".git");
        if dot_git.is_dir() && is_git_dir(&dot_git) {
            return Ok(Located {
                git_dir: dot_git,
                work_tree: Some(current.to_path_buf()),
            });
        }
        if dot_git.is_file() {
            return Ok(Located {
                git_dir: read_gitdir_file(&dot_git, current)?,
                work_tree: Some(current.to_path_buf()),
            });
        }
        if is_git_dir(current) {
            return Ok(Located {
                git_dir: current.to_path_buf(),
                work_tree: None,
            });
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return Err(RepoError::NotFound(start)),
        }
    }
}

/// Open an explicit git directory. A `.git` directory gets its parent as the
/// work tree; anything else is treated as bare.
pub(crate) fn open_git_dir(git_dir: &Path) -> Result<Located, RepoError> {
    let git_dir =
        fs::canonicalize(git_dir).map_err(|_| RepoError::NotFound(git_dir.to_path_buf()))?;
    if !is_git_dir(&git_dir) {
        return Err(RepoError::InvalidGitDir {
            path: git_dir,
            reason: "missing HEAD, objects/ or refs/".into(),
        });
    }
    let work_tree = match git_dir.file_name() {
        Some(name) if name == ".git" => git_dir.parent().map(Path::to_path_buf),
        _ => None,
    };
    Ok(Located { git_dir, work_tree })
}

/// `gitdir: <path>` redirect files used by submodules and linked worktrees.
fn read_gitdir_file(file: &Path, base: &Path) -> Result<PathBuf, RepoError> {
    let content = fs::read_to_string(file)?;
    let target = content
        .trim()
        .strip_prefix("gitdir:")
        .map(str::trim)
        .ok_or_else(|| RepoError::InvalidGitDir {
            path: file.to_path_buf(),
            reason: "expected 'gitdir: <path>'".into(),
        })?;
    let target = base.join(target);
    fs::canonicalize(&target).map_err(|e| RepoError::InvalidGitDir {
        path: file.to_path_buf(),
        reason: format!("cannot resolve gitdir target: {e}"),
    })
}

/// Create the minimal directory layout. Re-initializing leaves existing files alone.
pub(crate) fn init(path: &Path, hash_algo: HashAlgorithm) -> Result<Located, RepoError> {
    let path = if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path.to_path_buf()
    };
    let git_dir = path.join(".git");
    if !git_dir.join("HEAD").is_file() {
        fs::create_dir_all(git_dir.join("objects"))?;
        fs::create_dir_all(git_dir.join("refs").join("heads"))?;
        fs::create_dir_all(git_dir.join("refs").join("tags"))?;
        fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n")?;

        let mut config = String::from("[core]\n\trepositoryformatversion = ");
        match hash_algo {
            HashAlgorithm::Sha1 => config.push_str("0\n"),
            HashAlgorithm::Sha256 => config.push_str("1\n"),
        }
        config.push_str("\tfilemode = true\n\tbare = false\n");
        if hash_algo == HashAlgorithm::Sha256 {
            config.push_str("[extensions]\n\tobjectformat = sha256\n");
        }
        fs::write(git_dir.join("config"), config)?;
        tracing::debug!(git_dir = %git_dir.display(), "initialized repository");
    }
    Ok(Located {
        git_dir: fs::canonicalize(&git_dir)?,
        work_tree: Some(fs::canonicalize(&path)?),
    })
}
