//! Object model: blobs, trees, commits and tags in their canonical encoding.
//!
//! Parsing takes the repository's [`HashAlgorithm`] because trees embed raw
//! digests whose width depends on it.

mod blob;
mod commit;
pub mod header;
mod mode;
mod tag;
mod tree;

pub use blob::Blob;
pub use commit::{Commit, Signature};
pub use mode::FileMode;
pub use tag::Tag;
pub use tree::{Tree, TreeEntry};

use bstr::BString;
use octo_hash::hasher::Hasher;
use octo_hash::{HashAlgorithm, HashError, ObjectId};

/// Errors produced by object operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object type: {0}")]
    InvalidType(BString),

    #[error("invalid object header: {0}")]
    InvalidHeader(String),

    #[error("truncated object: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid tree entry at offset {offset}: {reason}")]
    InvalidTreeEntry { offset: usize, reason: &'static str },

    #[error("invalid {kind}: missing '{field}' header")]
    MissingField {
        kind: ObjectType,
        field: &'static str,
    },

    #[error("invalid file mode: {0}")]
    InvalidFileMode(BString),

    #[error("invalid signature: {0}")]
    InvalidSignature(BString),

    #[error(transparent)]
    Hash(#[from] HashError),
}

/// The four kinds of stored objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectType {
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            b"tag" => Ok(Self::Tag),
            _ => Err(ObjectError::InvalidType(BString::from(s))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
    Tag(Tag),
}

impl Object {
    /// Parse the body of an object whose type is already known.
    pub fn parse_content(
        kind: ObjectType,
        content: &[u8],
        algo: HashAlgorithm,
    ) -> Result<Self, ObjectError> {
        Ok(match kind {
            ObjectType::Blob => Self::Blob(Blob::new(content.to_vec())),
            ObjectType::Tree => Self::Tree(Tree::parse(content, algo)?),
            ObjectType::Commit => Self::Commit(Commit::parse(content)?),
            ObjectType::Tag => Self::Tag(Tag::parse(content)?),
        })
    }

    /// Parse `<type> <size>\0<content>`.
    pub fn parse(data: &[u8], algo: HashAlgorithm) -> Result<Self, ObjectError> {
        let (kind, size, header_len) = header::parse_header(data)?;
        let content = &data[header_len..];
        if content.len() < size {
            return Err(ObjectError::Truncated {
                expected: size,
                actual: content.len(),
            });
        }
        Self::parse_content(kind, &content[..size], algo)
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Blob(_) => ObjectType::Blob,
            Self::Tree(_) => ObjectType::Tree,
            Self::Commit(_) => ObjectType::Commit,
            Self::Tag(_) => ObjectType::Tag,
        }
    }

    /// Canonical body, without the header.
    pub fn serialize_content(&self) -> Vec<u8> {
        match self {
            Self::Blob(b) => b.data.clone(),
            Self::Tree(t) => t.serialize_content(),
            Self::Commit(c) => c.serialize_content(),
            Self::Tag(t) => t.serialize_content(),
        }
    }

    pub fn compute_oid(&self, algo: HashAlgorithm) -> Result<ObjectId, HashError> {
        Hasher::hash_object(algo, self.object_type().as_str(), &self.serialize_content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_header() {
        let obj = Object::parse(b"blob 5\0hello", HashAlgorithm::Sha1).unwrap();
        assert_eq!(obj, Object::Blob(Blob::new(b"hello".to_vec())));
    }

    #[test]
    fn truncated_body_is_rejected() {
        let err = Object::parse(b"blob 10\0short", HashAlgorithm::Sha1).unwrap_err();
        assert!(matches!(err, ObjectError::Truncated { expected: 10, actual: 5 }));
    }

    #[test]
    fn empty_tree_oid() {
        let oid = Object::Tree(Tree::default())
            .compute_oid(HashAlgorithm::Sha1)
            .unwrap();
        assert_eq!(oid, HashAlgorithm::Sha1.empty_tree().unwrap());
    }
}
