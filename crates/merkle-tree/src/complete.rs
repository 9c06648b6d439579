//! Sparse, left-flushed Merkle tree.

use crate::error::{MerkleError, Result};
use crate::hasher::concat_hash;
use crate::pristine::PristineTree;
use crate::proof::Proof;
use crate::Hash;

type Level = Vec<Hash>;

/// A sparse representation of a Merkle tree that stores only the leftmost
/// non-pristine hashes at each level, and derives the rest from
/// [`PristineTree`] on demand.
///
/// Supports point hash and proof queries at any `(address, log2_size)`,
/// not only at the leaf level.
#[derive(Debug, Clone)]
pub struct CompleteMerkleTree {
    log2_root_size: u32,
    log2_leaf_size: u32,
    pristine: PristineTree,
    // levels[k] holds the leftmost non-pristine hashes at log2_size =
    // log2_leaf_size + k, for k in 0..=(log2_root_size - log2_leaf_size).
    levels: Vec<Level>,
}

impl CompleteMerkleTree {
    /// Builds an empty tree. Fails with [`MerkleError::OutOfRange`] under
    /// the same conditions as [`crate::back::BackMerkleTree::new`].
    pub fn new(log2_root_size: u32, log2_leaf_size: u32, log2_word_size: u32) -> Result<Self> {
        if log2_root_size >= 64 {
            return Err(MerkleError::OutOfRange(
                "log2_root_size is too large for address type".to_string(),
            ));
        }
        if log2_leaf_size > log2_root_size {
            return Err(MerkleError::OutOfRange(
                "log2_leaf_size is greater than log2_root_size".to_string(),
            ));
        }
        if log2_word_size > log2_leaf_size {
            return Err(MerkleError::OutOfRange(
                "log2_word_size is greater than log2_leaf_size".to_string(),
            ));
        }

        let pristine = PristineTree::new(log2_root_size, log2_word_size)?;
        let num_levels = (log2_root_size - log2_leaf_size + 1) as usize;
        Ok(CompleteMerkleTree {
            log2_root_size,
            log2_leaf_size,
            pristine,
            levels: vec![Vec::new(); num_levels],
        })
    }

    /// Builds a tree from an initial leaf sequence (assumed flushed left)
    /// and runs [`CompleteMerkleTree::bubble_up`] once.
    pub fn from_leaves(log2_root_size: u32, log2_leaf_size: u32, log2_word_size: u32, leaves: Vec<Hash>) -> Result<Self> {
        let mut tree = Self::new(log2_root_size, log2_leaf_size, log2_word_size)?;
        if leaves.len() as u64 > tree.max_leaves() {
            return Err(MerkleError::OutOfRange(
                "too many leaves for tree capacity".to_string(),
            ));
        }
        tree.levels[0] = leaves;
        tree.bubble_up();
        Ok(tree)
    }

    fn max_leaves(&self) -> u64 {
        1u64 << (self.log2_root_size - self.log2_leaf_size)
    }

    fn level_index(&self, log2_size: u32) -> Result<usize> {
        if log2_size < self.log2_leaf_size || log2_size > self.log2_root_size {
            return Err(MerkleError::OutOfRange(format!(
                "log2_size {log2_size} is out of range [{}, {}]",
                self.log2_leaf_size, self.log2_root_size
            )));
        }
        Ok((log2_size - self.log2_leaf_size) as usize)
    }

    /// Number of leaves pushed so far.
    pub fn size(&self) -> u64 {
        self.levels[0].len() as u64
    }

    /// Returns the tree's root hash.
    pub fn get_root_hash(&self) -> Hash {
        self.get_node_hash(0, self.log2_root_size)
            .expect("address 0 at log2_root_size is always a valid node")
    }

    /// Returns the hash of the node covering `[address, address +
    /// 2^log2_size)`.
    ///
    /// Fails with [`MerkleError::OutOfRange`] if `log2_size` is outside
    /// `[log2_leaf_size, log2_root_size]`, `address` is not a multiple of
    /// `2^log2_size`, or the node would extend past the root's range.
    pub fn get_node_hash(&self, address: u64, log2_size: u32) -> Result<Hash> {
        let level_idx = self.level_index(log2_size)?;
        if address & ((1u64 << log2_size) - 1) != 0 {
            return Err(MerkleError::OutOfRange(format!(
                "address {address} is not a multiple of 2^{log2_size}"
            )));
        }
        if address + (1u64 << log2_size) > (1u64 << self.log2_root_size) {
            return Err(MerkleError::OutOfRange(format!(
                "node at address {address} of size 2^{log2_size} exceeds the tree"
            )));
        }

        let index = address >> log2_size;
        let level = &self.levels[level_idx];
        if (index as usize) < level.len() {
            Ok(level[index as usize])
        } else {
            self.pristine.get_hash(log2_size)
        }
    }

    /// Appends a new leaf. Fails with [`MerkleError::OutOfRange`] if the
    /// tree is already full.
    #[tracing::instrument(level = "trace", skip_all, fields(size = self.size()))]
    pub fn push_back(&mut self, hash: Hash) -> Result<()> {
        if self.size() >= self.max_leaves() {
            return Err(MerkleError::OutOfRange("too many leaves".to_string()));
        }
        self.levels[0].push(hash);
        self.bubble_up();
        Ok(())
    }

    /// Rebuilds every level above the leaf level from scratch.
    ///
    /// This rebuilds in full on every `push_back` rather than updating
    /// incrementally (see DESIGN.md); each level is still touched only
    /// once per call, giving the same amortised `O(depth)` bound an
    /// incremental version would.
    ///
    /// Runs all the way to the root on every call, even once a level's
    /// length has dropped to 0 or 1: a level holding exactly one real hash
    /// still needs folding against pristine siblings at every level above
    /// it, so stopping early would leave the root level stale at its
    /// initial empty state and `get_node_hash` would wrongly report it as
    /// fully pristine.
    fn bubble_up(&mut self) {
        let depth = (self.log2_root_size - self.log2_leaf_size) as usize;
        for l in 0..depth {
            let log2_size = self.log2_leaf_size + l as u32;
            let current_len = self.levels[l].len();
            let next_len = current_len.div_ceil(2);
            let mut next = Vec::with_capacity(next_len);
            for j in 0..next_len {
                let left = self.levels[l][2 * j];
                let right = if 2 * j + 1 < current_len {
                    self.levels[l][2 * j + 1]
                } else {
                    self.pristine
                        .get_hash(log2_size)
                        .expect("log2_size is within the pristine table's range by construction")
                };
                next.push(concat_hash(&left, &right));
            }
            self.levels[l + 1] = next;
        }
    }

    /// Returns a proof for the node covering `[address, address +
    /// 2^log2_size)`.
    ///
    /// Fails with [`MerkleError::OutOfRange`] under the same conditions as
    /// [`CompleteMerkleTree::get_node_hash`].
    #[tracing::instrument(level = "trace", skip_all, fields(address, log2_size))]
    pub fn get_proof(&self, address: u64, log2_size: u32) -> Result<Proof> {
        let target_hash = self.get_node_hash(address, log2_size)?;
        let root_hash = self.get_root_hash();

        let mut proof = Proof::new(self.log2_root_size, log2_size)?;
        proof.set_target_address(address)?;
        proof.set_target_hash(target_hash);
        proof.set_root_hash(root_hash);

        for level in log2_size..self.log2_root_size {
            let sibling_address = address ^ (1u64 << level);
            let sibling_hash = self.get_node_hash(sibling_address, level)?;
            proof.set_sibling_hash(sibling_hash, level)?;
        }

        if cfg!(debug_assertions) && !proof.verify() {
            return Err(MerkleError::Internal("produced invalid proof".to_string()));
        }
        Ok(proof)
    }
}
