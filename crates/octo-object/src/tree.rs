use std::cmp::Ordering;

use bstr::{BStr, BString, ByteSlice};
use octo_hash::{HashAlgorithm, ObjectId};

use crate::{FileMode, ObjectError};

/// One named entry of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: FileMode,
    pub name: BString,
    pub oid: ObjectId,
}

impl TreeEntry {
    /// Canonical tree order: a directory compares as if its name ended in `/`.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        let key = |e: &TreeEntry, i: usize| -> u8 {
            match e.name.get(i) {
                Some(&b) => b,
                None if e.mode.is_tree() => b'/',
                None => 0,
            }
        };
        let common = self.name.len().min(other.name.len());
        self.name[..common]
            .cmp(&other.name[..common])
            .then_with(|| key(self, common).cmp(&key(other, common)))
    }
}

/// A directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Parse the binary body: repeated `<octal mode> <name>\0<raw digest>`.
    pub fn parse(content: &[u8], algo: HashAlgorithm) -> Result<Self, ObjectError> {
        let digest_len = algo.digest_len();
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < content.len() {
            let rest = &content[pos..];
            let space = rest.find_byte(b' ').ok_or(ObjectError::InvalidTreeEntry {
                offset: pos,
                reason: "missing space after mode",
            })?;
            let mode = FileMode::from_octal(&rest[..space]).map_err(|_| {
                ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "invalid mode",
                }
            })?;
            let nul = rest.find_byte(0).ok_or(ObjectError::InvalidTreeEntry {
                offset: pos,
                reason: "missing NUL after name",
            })?;
            if nul < space || nul + 1 + digest_len > rest.len() {
                return Err(ObjectError::InvalidTreeEntry {
                    offset: pos,
                    reason: "truncated entry",
                });
            }
            let name = BString::from(&rest[space + 1..nul]);
            let oid = ObjectId::from_bytes(&rest[nul + 1..nul + 1 + digest_len], algo)?;
            entries.push(TreeEntry { mode, name, oid });
            pos += nul + 1 + digest_len;
        }
        Ok(Self { entries })
    }

    /// Canonical body; entries are written in canonical order.
    pub fn serialize_content(&self) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.canonical_cmp(b));

        let mut out = Vec::new();
        for entry in sorted {
            out.extend_from_slice(entry.mode.to_octal().as_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.name);
            out.push(0);
            out.extend_from_slice(entry.oid.as_bytes());
        }
        out
    }

    pub fn find(&self, name: &BStr) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name.as_bstr() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::Sha1([n; 20])
    }

    fn entry(name: &str, mode: FileMode) -> TreeEntry {
        TreeEntry {
            mode,
            name: name.into(),
            oid: oid(1),
        }
    }

    #[test]
    fn directories_sort_with_implicit_slash() {
        let mut entries = vec![
            entry("foo.c", FileMode::Regular),
            entry("foo", FileMode::Tree),
            entry("foo-bar", FileMode::Regular),
        ];
        entries.sort_by(|a, b| a.canonical_cmp(b));
        let names: Vec<_> = entries.iter().map(|e| e.name.to_string()).collect();
        assert_eq!(names, ["foo-bar", "foo.c", "foo"]);
    }

    #[test]
    fn parse_serialized_body() {
        let tree = Tree {
            entries: vec![entry("b", FileMode::Executable), entry("a", FileMode::Tree)],
        };
        let body = tree.serialize_content();
        assert!(body.starts_with(b"40000 a\0"));

        let parsed = Tree::parse(&body, HashAlgorithm::Sha1).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.entries[0].name, "a");
        assert_eq!(parsed.find("b".into()).unwrap().mode, FileMode::Executable);
    }

    #[test]
    fn truncated_digest_is_rejected() {
        let mut body = b"100644 f\0".to_vec();
        body.extend_from_slice(&[7u8; 10]);
        let err = Tree::parse(&body, HashAlgorithm::Sha1).unwrap_err();
        assert!(matches!(err, ObjectError::InvalidTreeEntry { offset: 0, .. }));
    }
}
