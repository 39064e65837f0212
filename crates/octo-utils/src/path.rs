//! Validation of repository-relative paths before they enter the index.

use bstr::{BStr, ByteSlice};

use crate::error::UtilError;
use crate::Result;

/// Check that `path` can be stored in the index.
///
/// Rejects empty paths, absolute paths, trailing or doubled separators, and
/// `.`, `..` or `.git` (any case) components.
pub fn verify_path(path: &BStr) -> Result<()> {
    let valid = !path.is_empty() && path.split_str("/").all(valid_component);
    if valid {
        Ok(())
    } else {
        Err(UtilError::InvalidPath {
            path: path.to_owned(),
        })
    }
}

fn valid_component(component: &[u8]) -> bool {
    !component.is_empty()
        && component != b"."
        && component != b".."
        && !component.eq_ignore_ascii_case(b".git")
}

/// Join a repository-relative path onto a directory.
pub fn to_native(root: &std::path::Path, path: &BStr) -> std::path::PathBuf {
    let mut out = root.to_path_buf();
    for component in path.split_str("/") {
        out.push(component.to_os_str_lossy());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_paths() {
        for p in ["f", "dir/file.txt", ".gitignore", "a/.github/x", "..hidden"] {
            assert!(verify_path(p.into()).is_ok(), "{p} should be valid");
        }
    }

    #[test]
    fn rejects_dangerous_paths() {
        for p in ["", "/abs", "a//b", "trailing/", "./x", "a/../b", ".git/config", "x/.GIT"] {
            assert!(verify_path(p.into()).is_err(), "{p} should be rejected");
        }
    }

    #[test]
    fn native_join_splits_on_slash() {
        let root = std::path::Path::new("/work");
        assert_eq!(
            to_native(root, "a/b/c".into()),
            std::path::PathBuf::from("/work/a/b/c")
        );
    }
}
