//! Pristine (all-zero) subtree hashes.

use crate::error::{MerkleError, Result};
use crate::hasher::{concat_hash, hash_word};
use crate::Hash;

/// Precomputed hashes of an all-zero subtree at every height between a word
/// size and a root size.
///
/// Immutable after construction. Both mutable trees in this crate
/// ([`crate::back::BackMerkleTree`] and [`crate::complete::CompleteMerkleTree`])
/// own one of these to answer "what does an untouched subtree of this size
/// hash to" without recomputing it.
#[derive(Debug, Clone)]
pub struct PristineTree {
    log2_root_size: u32,
    log2_word_size: u32,
    // hashes[i] is the pristine hash at height `log2_word_size + i`.
    hashes: Vec<Hash>,
}

impl PristineTree {
    /// Builds the pristine hash table for every height in
    /// `[log2_word_size, log2_root_size]`.
    ///
    /// Fails with [`MerkleError::OutOfRange`] if `log2_word_size >
    /// log2_root_size`.
    #[tracing::instrument(level = "trace", skip_all, fields(log2_root_size, log2_word_size))]
    pub fn new(log2_root_size: u32, log2_word_size: u32) -> Result<Self> {
        if log2_word_size > log2_root_size {
            return Err(MerkleError::OutOfRange(
                "log2_word_size is greater than log2_root_size".to_string(),
            ));
        }

        let word = vec![0u8; 1usize << log2_word_size];
        let mut hashes = Vec::with_capacity((log2_root_size - log2_word_size + 1) as usize);
        hashes.push(hash_word(&word));
        for i in 1..=(log2_root_size - log2_word_size) {
            let prev = hashes[(i - 1) as usize];
            hashes.push(concat_hash(&prev, &prev));
        }

        Ok(PristineTree {
            log2_root_size,
            log2_word_size,
            hashes,
        })
    }

    /// Returns the hash of the pristine subtree of size `2^log2_size`.
    ///
    /// Fails with [`MerkleError::OutOfRange`] if `log2_size` is outside
    /// `[log2_word_size, log2_root_size]` as passed to [`PristineTree::new`].
    pub fn get_hash(&self, log2_size: u32) -> Result<Hash> {
        if log2_size < self.log2_word_size || log2_size > self.log2_root_size {
            return Err(MerkleError::OutOfRange(format!(
                "log2_size {log2_size} is out of range [{}, {}]",
                self.log2_word_size, self.log2_root_size
            )));
        }
        Ok(self.hashes[(log2_size - self.log2_word_size) as usize])
    }

    /// Log2 of the root size this table was built for.
    pub fn log2_root_size(&self) -> u32 {
        self.log2_root_size
    }

    /// Log2 of the word size this table was built for.
    pub fn log2_word_size(&self) -> u32 {
        self.log2_word_size
    }
}
