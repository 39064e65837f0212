use std::fmt;
use std::str::FromStr;

use crate::hex;
use crate::{HashAlgorithm, HashError};

/// Identifier of an immutable object: the digest of its canonical encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectId {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl ObjectId {
    pub const NULL_SHA1: Self = Self::Sha1([0u8; 20]);
    pub const NULL_SHA256: Self = Self::Sha256([0u8; 32]);

    /// Build an id from a raw digest of the algorithm's length.
    pub fn from_bytes(bytes: &[u8], algo: HashAlgorithm) -> Result<Self, HashError> {
        if bytes.len() != algo.digest_len() {
            return Err(HashError::InvalidHashLength {
                expected: algo.digest_len(),
                actual: bytes.len(),
            });
        }
        Ok(match algo {
            HashAlgorithm::Sha1 => {
                let mut raw = [0u8; 20];
                raw.copy_from_slice(bytes);
                Self::Sha1(raw)
            }
            HashAlgorithm::Sha256 => {
                let mut raw = [0u8; 32];
                raw.copy_from_slice(bytes);
                Self::Sha256(raw)
            }
        })
    }

    /// Parse a full-length hex id; the algorithm follows from the length.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let algo = HashAlgorithm::from_hex_len(s.len()).ok_or(HashError::InvalidHexLength {
            expected: HashAlgorithm::Sha1.hex_len(),
            actual: s.len(),
        })?;
        let mut raw = [0u8; 32];
        let raw = &mut raw[..algo.digest_len()];
        hex::decode_into(s, raw)?;
        Self::from_bytes(raw, algo)
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(b) => b,
            Self::Sha256(b) => b,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Sha1(_) => HashAlgorithm::Sha1,
            Self::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    pub fn is_null(&self) -> bool {
        self.as_bytes().iter().all(|&b| b == 0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Abbreviated hex used in diagnostics.
    pub fn short_hex(&self) -> String {
        let mut s = self.to_hex();
        s.truncate(8);
        s
    }

    /// Case-insensitive prefix test on the hex form.
    pub fn starts_with_hex(&self, prefix: &str) -> bool {
        self.to_hex().starts_with(&prefix.to_ascii_lowercase())
    }

    /// Relative path of the loose object: `xx/yyyy...`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl FromStr for ObjectId {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOB_HEX: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    #[test]
    fn parse_and_display() {
        let oid: ObjectId = BLOB_HEX.parse().unwrap();
        assert_eq!(oid.algorithm(), HashAlgorithm::Sha1);
        assert_eq!(oid.to_string(), BLOB_HEX);
        assert_eq!(format!("{oid:?}"), "ObjectId(e69de29b)");
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let lower = ObjectId::from_hex(BLOB_HEX).unwrap();
        let upper = ObjectId::from_hex(&BLOB_HEX.to_uppercase()).unwrap();
        assert_eq!(lower, upper);
        assert!(lower.starts_with_hex("E69D"));
    }

    #[test]
    fn rejects_wrong_lengths() {
        assert!(matches!(
            ObjectId::from_hex("abcd"),
            Err(HashError::InvalidHexLength { actual: 4, .. })
        ));
        assert!(matches!(
            ObjectId::from_bytes(&[1; 21], HashAlgorithm::Sha1),
            Err(HashError::InvalidHashLength { expected: 20, actual: 21 })
        ));
    }

    #[test]
    fn null_and_loose_path() {
        assert!(ObjectId::NULL_SHA256.is_null());
        let oid = ObjectId::from_hex(BLOB_HEX).unwrap();
        assert!(!oid.is_null());
        assert_eq!(oid.loose_path(), format!("e6/{}", &BLOB_HEX[2..]));
    }
}
