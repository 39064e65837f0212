use std::fmt;

use bstr::BString;

use crate::ObjectError;

/// Mode of a tree or index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileMode {
    /// 100644
    Regular,
    /// 100755
    Executable,
    /// 120000
    Symlink,
    /// 160000, a submodule commit
    Gitlink,
    /// 040000
    Tree,
    /// Anything else, kept so it can be written back unchanged.
    Unknown(u32),
}

impl FileMode {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0o100644 => Self::Regular,
            0o100755 => Self::Executable,
            0o120000 => Self::Symlink,
            0o160000 => Self::Gitlink,
            0o040000 => Self::Tree,
            other => Self::Unknown(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::Regular => 0o100644,
            Self::Executable => 0o100755,
            Self::Symlink => 0o120000,
            Self::Gitlink => 0o160000,
            Self::Tree => 0o040000,
            Self::Unknown(v) => v,
        }
    }

    /// Parse octal digits such as `100644`.
    pub fn from_octal(s: &[u8]) -> Result<Self, ObjectError> {
        let invalid = || ObjectError::InvalidFileMode(BString::from(s));
        if s.is_empty() || s.len() > 7 {
            return Err(invalid());
        }
        let mut raw = 0u32;
        for &b in s {
            if !(b'0'..=b'7').contains(&b) {
                return Err(invalid());
            }
            raw = raw * 8 + u32::from(b - b'0');
        }
        Ok(Self::from_raw(raw))
    }

    /// Octal text as stored in trees (no leading zero for directories).
    pub fn to_octal(self) -> String {
        format!("{:o}", self.raw())
    }

    pub fn is_tree(self) -> bool {
        matches!(self, Self::Tree)
    }

    /// Regular or executable file.
    pub fn is_file(self) -> bool {
        matches!(self, Self::Regular | Self::Executable)
    }

    pub fn is_symlink(self) -> bool {
        matches!(self, Self::Symlink)
    }

    pub fn is_gitlink(self) -> bool {
        matches!(self, Self::Gitlink)
    }

    /// Permission bits a checked-out file gets.
    pub fn permissions(self) -> u32 {
        match self {
            Self::Executable => 0o755,
            _ => 0o644,
        }
    }
}

/// Formats the mode in octal, the way merge messages print it.
impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_modes() {
        assert_eq!(FileMode::from_octal(b"100644").unwrap(), FileMode::Regular);
        assert_eq!(FileMode::from_octal(b"100755").unwrap(), FileMode::Executable);
        assert_eq!(FileMode::from_octal(b"40000").unwrap(), FileMode::Tree);
        assert_eq!(FileMode::from_octal(b"160000").unwrap(), FileMode::Gitlink);
        assert_eq!(FileMode::from_octal(b"100664").unwrap(), FileMode::Unknown(0o100664));
    }

    #[test]
    fn rejects_non_octal() {
        assert!(FileMode::from_octal(b"").is_err());
        assert!(FileMode::from_octal(b"100648").is_err());
        assert!(FileMode::from_octal(b"12345678").is_err());
    }

    #[test]
    fn display_is_octal() {
        assert_eq!(FileMode::Executable.to_string(), "100755");
        assert_eq!(FileMode::Tree.to_octal(), "40000");
        assert_eq!(FileMode::Symlink.permissions(), 0o644);
        assert_eq!(FileMode::Executable.permissions(), 0o755);
    }
}
