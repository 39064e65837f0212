use digest::Digest;

use crate::{HashAlgorithm, HashError, ObjectId};

enum State {
    Sha1(Box<sha1_checked::Sha1>),
    Sha256(sha2::Sha256),
}

/// Streaming digest that yields an [`ObjectId`].
///
/// SHA-1 runs with collision detection; a detected collision fails
/// [`Hasher::finalize`] instead of producing an id.
pub struct Hasher {
    state: State,
}

impl Hasher {
    pub fn new(algo: HashAlgorithm) -> Self {
        let state = match algo {
            HashAlgorithm::Sha1 => State::Sha1(Box::default()),
            HashAlgorithm::Sha256 => State::Sha256(sha2::Sha256::new()),
        };
        Self { state }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            State::Sha1(h) => Digest::update(&mut **h, data),
            State::Sha256(h) => Digest::update(h, data),
        }
    }

    pub fn finalize(self) -> Result<ObjectId, HashError> {
        match self.state {
            State::Sha1(h) => {
                let outcome = h.try_finalize();
                if outcome.has_collision() {
                    return Err(HashError::Sha1Collision);
                }
                ObjectId::from_bytes(outcome.hash().as_slice(), HashAlgorithm::Sha1)
            }
            State::Sha256(h) => ObjectId::from_bytes(h.finalize().as_slice(), HashAlgorithm::Sha256),
        }
    }

    /// Id of an object of `kind` with `data` as its content.
    pub fn hash_object(algo: HashAlgorithm, kind: &str, data: &[u8]) -> Result<ObjectId, HashError> {
        let mut h = Self::new(algo);
        h.update(format!("{} {}\0", kind, data.len()).as_bytes());
        h.update(data);
        h.finalize()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
