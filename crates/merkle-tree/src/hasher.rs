//! Incremental Keccak-256 hashing.

use sha3::{Digest, Keccak256};

use crate::Hash;

/// Capability implemented by a restartable, single-threaded hasher that
/// produces a 32-byte digest. The algorithm in this crate is agnostic to
/// the concrete implementation; only this shape and the digest size are
/// contractual.
pub trait Hasher {
    /// Resets the hasher, discarding any state from a previous `begin/end`
    /// pair.
    fn begin(&mut self);

    /// Feeds more bytes into the current hash computation. Calling this
    /// before `begin` is a programmer error.
    fn add_data(&mut self, data: &[u8]);

    /// Finalizes the current hash computation and returns the digest.
    fn end(&mut self) -> Hash;
}

/// Keccak-256 implementation of [`Hasher`], backed by `sha3::Keccak256`.
#[derive(Default)]
pub struct KeccakHasher {
    inner: Keccak256,
}

impl KeccakHasher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Hasher for KeccakHasher {
    fn begin(&mut self) {
        self.inner = Keccak256::new();
    }

    fn add_data(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    fn end(&mut self) -> Hash {
        let digest = std::mem::take(&mut self.inner).finalize();
        Hash(digest.into())
    }
}

/// Computes `Keccak256(left || right)`.
///
/// Must behave exactly as `begin; add_data(left); add_data(right); end`
/// against a fresh [`KeccakHasher`] — callers that need a custom hasher can
/// reimplement this sequence directly.
pub fn concat_hash(left: &Hash, right: &Hash) -> Hash {
    let mut h = KeccakHasher::new();
    h.begin();
    h.add_data(left.as_ref());
    h.add_data(right.as_ref());
    h.end()
}

/// Computes the Keccak-256 hash of a single byte slice (a leaf word).
pub fn hash_word(bytes: &[u8]) -> Hash {
    let mut h = KeccakHasher::new();
    h.begin();
    h.add_data(bytes);
    h.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_hash_matches_manual_sequence() {
        let left = hash_word(&[0u8; 8]);
        let right = hash_word(&[1u8; 8]);

        let mut h = KeccakHasher::new();
        h.begin();
        h.add_data(left.as_ref());
        h.add_data(right.as_ref());
        let expected = h.end();

        assert_eq!(concat_hash(&left, &right), expected);
    }

    #[test]
    fn hasher_is_restartable() {
        let mut h = KeccakHasher::new();
        h.begin();
        h.add_data(b"garbage that should be discarded");
        h.begin();
        h.add_data(b"abc");
        let a = h.end();

        h.begin();
        h.add_data(b"abc");
        let b = h.end();

        assert_eq!(a, b);
    }

    #[test]
    fn known_keccak256_of_empty_word() {
        // Keccak-256("") is a well known test vector.
        let h = hash_word(&[]);
        assert_eq!(
            hex::encode(h.as_ref()),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a47"
        );
    }
}
