//! Binary Merkle-tree engines over Keccak-256.
//!
//! This crate implements the three complementary trees used by a
//! rollup/state-commitment system to reason about fixed-capacity,
//! power-of-two-sized address spaces:
//!
//! - [`pristine::PristineTree`]: the canonical hash of an all-zero subtree
//!   at every height between a word size and a root size.
//! - [`back::BackMerkleTree`]: a streaming, append-only tree whose leaves
//!   fill left to right, with unwritten positions treated as pristine.
//! - [`complete::CompleteMerkleTree`]: a sparse tree that stores only
//!   non-pristine hashes and answers point queries and proofs at arbitrary
//!   internal nodes.
//!
//! All three share one data model: uniform binary trees indexed by byte
//! address and `log2` size, leaf/word hashing by Keccak-256, and internal
//! node hash `Keccak(left || right)`. [`proof::Proof`] is the inclusion-proof
//! value type produced and consumed by all three.
//!
//! The crate is a pure in-memory library: no threads, no I/O, no persisted
//! state. Callers own concurrency control and persistence.

pub mod back;
pub mod complete;
pub mod error;
pub mod hasher;
pub mod pristine;
pub mod proof;

pub use back::BackMerkleTree;
pub use complete::CompleteMerkleTree;
pub use error::{MerkleError, Result};
pub use hasher::{concat_hash, hash_word, Hasher, KeccakHasher};
pub use pristine::PristineTree;
pub use proof::{proof_from_sibling_list, proof_to_sibling_list, Proof};

/// Length in bytes of every hash produced or consumed by this crate.
pub const HASH_SIZE: usize = 32;

/// An opaque 32-byte Keccak-256 digest.
///
/// Equality is byte-wise; no ordering is defined or required. Hashes are
/// always passed and stored by value.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hash(#[cfg_attr(feature = "serde", serde(with = "hash_bytes"))] pub [u8; HASH_SIZE]);

impl Hash {
    /// The all-zero hash. Not a cryptographic value on its own; used only
    /// as a starting point for incremental computation.
    pub const ZERO: Hash = Hash([0u8; HASH_SIZE]);

    /// Builds a hash from a byte slice, failing with
    /// [`MerkleError::InvalidArgument`] if its length is not exactly
    /// [`HASH_SIZE`]. This is the boundary check any wire adapter carrying
    /// a hash as an opaque byte string must perform.
    pub fn from_slice(bytes: &[u8]) -> Result<Hash> {
        if bytes.len() != HASH_SIZE {
            return Err(MerkleError::InvalidArgument(format!(
                "hash must be {HASH_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut buf = [0u8; HASH_SIZE];
        buf.copy_from_slice(bytes);
        Ok(Hash(buf))
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

#[cfg(feature = "serde")]
mod hash_bytes {
    use super::HASH_SIZE;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; HASH_SIZE], s: S) -> std::result::Result<S::Ok, S::Error> {
        bytes.as_slice().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<[u8; HASH_SIZE], D::Error> {
        let v = Vec::<u8>::deserialize(d)?;
        v.try_into()
            .map_err(|v: Vec<u8>| serde::de::Error::invalid_length(v.len(), &"32 bytes"))
    }
}
