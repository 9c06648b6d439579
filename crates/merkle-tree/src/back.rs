//! Append-only streaming Merkle tree.

use crate::error::{MerkleError, Result};
use crate::hasher::concat_hash;
use crate::pristine::PristineTree;
use crate::proof::Proof;
use crate::Hash;

/// A fixed-capacity, append-only Merkle tree whose leaves are filled
/// left-to-right. Unwritten positions are treated as pristine.
///
/// Maintains `O(depth)` context so that [`BackMerkleTree::push_back`],
/// [`BackMerkleTree::get_root_hash`], and
/// [`BackMerkleTree::get_next_leaf_proof`] are each `O(depth)` hashes and
/// memory, where `depth = log2_root_size - log2_leaf_size`.
#[derive(Debug, Clone)]
pub struct BackMerkleTree {
    log2_root_size: u32,
    log2_leaf_size: u32,
    leaf_count: u64,
    max_leaves: u64,
    // context[i] holds the hash of a closed subtree of 2^i leaves at height
    // log2_leaf_size + i, valid only when bit i of leaf_count is set.
    context: Vec<Hash>,
    pristine: PristineTree,
}

impl BackMerkleTree {
    /// Fails with [`MerkleError::OutOfRange`] if `log2_word_size >
    /// log2_leaf_size`, `log2_leaf_size > log2_root_size`, or
    /// `log2_root_size >= 64`.
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

        let depth = log2_root_size - log2_leaf_size;
        let pristine = PristineTree::new(log2_root_size, log2_word_size)?;
        Ok(BackMerkleTree {
            log2_root_size,
            log2_leaf_size,
            leaf_count: 0,
            max_leaves: 1u64 << depth,
            context: vec![Hash::ZERO; depth as usize + 1],
            pristine,
        })
    }

    fn depth(&self) -> u32 {
        self.log2_root_size - self.log2_leaf_size
    }

    /// Number of leaves appended so far.
    pub fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    /// Tree capacity in leaves, `2^(log2_root_size - log2_leaf_size)`.
    pub fn max_leaves(&self) -> u64 {
        self.max_leaves
    }

    /// Whether the tree has reached capacity.
    pub fn is_full(&self) -> bool {
        self.leaf_count == self.max_leaves
    }

    /// Appends a leaf hash. Fails with [`MerkleError::OutOfRange`] if the
    /// tree is already full; in that case no state is mutated.
    #[tracing::instrument(level = "trace", skip_all, fields(leaf_count = self.leaf_count))]
    pub fn push_back(&mut self, leaf_hash: Hash) -> Result<()> {
        if self.leaf_count >= self.max_leaves {
            return Err(MerkleError::OutOfRange("too many leaves".to_string()));
        }

        let mut right = leaf_hash;
        for i in 0..=self.depth() {
            if self.leaf_count & (1u64 << i) != 0 {
                let left = self.context[i as usize];
                right = concat_hash(&left, &right);
            } else {
                self.context[i as usize] = right;
                break;
            }
        }
        self.leaf_count += 1;
        Ok(())
    }

    /// Returns the tree's current root hash, folding closed subtrees on the
    /// left with pristine subtrees on the right for any unfilled capacity.
    pub fn get_root_hash(&self) -> Hash {
        if self.leaf_count == self.max_leaves {
            return self.context[self.depth() as usize];
        }

        let mut root = self
            .pristine
            .get_hash(self.log2_leaf_size)
            .expect("log2_leaf_size is within the pristine table's range by construction");
        for i in 0..self.depth() {
            if self.leaf_count & (1u64 << i) != 0 {
                let left = self.context[i as usize];
                root = concat_hash(&left, &root);
            } else {
                let right = self
                    .pristine
                    .get_hash(self.log2_leaf_size + i)
                    .expect("log2_leaf_size + i is within the pristine table's range by construction");
                root = concat_hash(&root, &right);
            }
        }
        root
    }

    /// Returns a proof for the next leaf position (the pristine leaf the
    /// tree currently holds there), with siblings drawn from context and
    /// the pristine table. Fails with [`MerkleError::OutOfRange`] if the
    /// tree is full.
    ///
    /// In debug builds, the produced proof is re-verified before return; a
    /// failure there indicates a bug in this crate and is reported as
    /// [`MerkleError::Internal`].
    #[tracing::instrument(level = "trace", skip_all, fields(leaf_count = self.leaf_count))]
    pub fn get_next_leaf_proof(&self) -> Result<Proof> {
        if self.leaf_count >= self.max_leaves {
            return Err(MerkleError::OutOfRange("tree is full".to_string()));
        }

        let target_hash = self
            .pristine
            .get_hash(self.log2_leaf_size)
            .expect("log2_leaf_size is within the pristine table's range by construction");

        let mut proof = Proof::new(self.log2_root_size, self.log2_leaf_size)?;
        proof.set_target_address(self.leaf_count << self.log2_leaf_size)?;
        proof.set_target_hash(target_hash);

        let mut hash = target_hash;
        for i in 0..self.depth() {
            let log2_size = self.log2_leaf_size + i;
            if self.leaf_count & (1u64 << i) != 0 {
                let left = self.context[i as usize];
                proof.set_sibling_hash(left, log2_size)?;
                hash = concat_hash(&left, &hash);
            } else {
                let right = self
                    .pristine
                    .get_hash(log2_size)
                    .expect("log2_size is within the pristine table's range by construction");
                proof.set_sibling_hash(right, log2_size)?;
                hash = concat_hash(&hash, &right);
            }
        }
        proof.set_root_hash(hash);

        if cfg!(debug_assertions) && !proof.verify() {
            return Err(MerkleError::Internal("produced invalid proof".to_string()));
        }
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_word;

    #[test]
    fn rejects_root_too_large() {
        assert!(BackMerkleTree::new(64, 3, 3).is_err());
        assert!(BackMerkleTree::new(63, 3, 3).is_ok());
    }

    #[test]
    fn rejects_leaf_greater_than_root_and_word_greater_than_leaf() {
        assert!(BackMerkleTree::new(3, 5, 3).is_err());
        assert!(BackMerkleTree::new(5, 3, 4).is_err());
    }

    #[test]
    fn empty_tree_root_is_pristine() {
        let t = BackMerkleTree::new(5, 3, 3).unwrap();
        let pristine = PristineTree::new(5, 3).unwrap();
        assert_eq!(t.get_root_hash(), pristine.get_hash(5).unwrap());
    }

    #[test]
    fn single_append_matches_hand_computed_root() {
        let mut t = BackMerkleTree::new(5, 3, 3).unwrap();
        let h = hash_word(&[0u8; 8]);
        t.push_back(h).unwrap();

        let pw = hash_word(&[0u8; 8]);
        let expected = concat_hash(&concat_hash(&h, &pw), &concat_hash(&pw, &pw));
        assert_eq!(t.get_root_hash(), expected);
    }

    #[test]
    fn full_tree_of_two_leaves() {
        let mut t = BackMerkleTree::new(4, 3, 3).unwrap();
        let a = hash_word(&[0xAAu8; 8]);
        let b = hash_word(&[0xBBu8; 8]);
        t.push_back(a).unwrap();
        t.push_back(b).unwrap();
        assert!(t.is_full());
        assert_eq!(t.get_root_hash(), concat_hash(&a, &b));
        assert!(matches!(t.push_back(a), Err(MerkleError::OutOfRange(_))));
    }

    #[test]
    fn next_leaf_proof_verifies_before_and_target_hash_matches_after() {
        let mut t = BackMerkleTree::new(5, 3, 3).unwrap();
        for i in 0..3u8 {
            let proof = t.get_next_leaf_proof().unwrap();
            assert!(proof.verify());
            assert_eq!(proof.root_hash(), t.get_root_hash());
            let pristine = PristineTree::new(5, 3).unwrap();
            assert_eq!(proof.target_hash(), pristine.get_hash(3).unwrap());
            t.push_back(hash_word(&[i; 8])).unwrap();
        }
    }

    #[test]
    fn get_next_leaf_proof_fails_when_full() {
        let mut t = BackMerkleTree::new(4, 3, 3).unwrap();
        t.push_back(hash_word(&[0u8; 8])).unwrap();
        t.push_back(hash_word(&[1u8; 8])).unwrap();
        assert!(t.get_next_leaf_proof().is_err());
    }

    #[test]
    fn zero_capacity_edge_single_leaf_tree() {
        let mut t = BackMerkleTree::new(3, 3, 3).unwrap();
        assert_eq!(t.max_leaves(), 1);
        let h = hash_word(&[7u8; 8]);
        t.push_back(h).unwrap();
        assert_eq!(t.get_root_hash(), h);
        assert!(t.push_back(h).is_err());
    }
}
