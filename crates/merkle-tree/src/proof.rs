//! Merkle inclusion proofs and the two-level composition helpers used to
//! exchange them with an external harness.

use crate::error::{MerkleError, Result};
use crate::hasher::concat_hash;
use crate::Hash;

/// An inclusion proof for a node at `(target_address, log2_target_size)`
/// inside a tree of size `2^log2_root_size`.
///
/// Internally, sibling hashes are indexed by `log2_size` (ascending, from
/// `log2_target_size` up to `log2_root_size - 1`). The canonical *external*
/// ordering is the reverse — decreasing `log2_size` — and is only honoured
/// at the boundary by [`proof_from_sibling_list`] and
/// [`proof_to_sibling_list`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Proof {
    log2_root_size: u32,
    log2_target_size: u32,
    target_address: u64,
    target_hash: Hash,
    root_hash: Hash,
    // sibling_hashes[i] is the sibling at log2_size = log2_target_size + i.
    sibling_hashes: Vec<Hash>,
}

impl Proof {
    /// Creates an empty proof shell for a target of size `2^log2_target_size`
    /// within a root of size `2^log2_root_size`. All hashes start as
    /// [`Hash::ZERO`] and `target_address` as `0`; callers fill them in with
    /// the setters below.
    pub fn new(log2_root_size: u32, log2_target_size: u32) -> Result<Self> {
        if log2_target_size > log2_root_size {
            return Err(MerkleError::OutOfRange(
                "log2_target_size is greater than log2_root_size".to_string(),
            ));
        }
        Ok(Proof {
            log2_root_size,
            log2_target_size,
            target_address: 0,
            target_hash: Hash::ZERO,
            root_hash: Hash::ZERO,
            sibling_hashes: vec![Hash::ZERO; (log2_root_size - log2_target_size) as usize],
        })
    }

    pub fn log2_root_size(&self) -> u32 {
        self.log2_root_size
    }

    pub fn log2_target_size(&self) -> u32 {
        self.log2_target_size
    }

    pub fn target_address(&self) -> u64 {
        self.target_address
    }

    pub fn target_hash(&self) -> Hash {
        self.target_hash
    }

    pub fn root_hash(&self) -> Hash {
        self.root_hash
    }

    /// Sets the target address. Fails with [`MerkleError::OutOfRange`] if
    /// it is not a multiple of `2^log2_target_size`.
    pub fn set_target_address(&mut self, address: u64) -> Result<()> {
        if address & ((1u64 << self.log2_target_size) - 1) != 0 {
            return Err(MerkleError::OutOfRange(format!(
                "target_address {address} is not a multiple of 2^{}",
                self.log2_target_size
            )));
        }
        self.target_address = address;
        Ok(())
    }

    pub fn set_target_hash(&mut self, hash: Hash) {
        self.target_hash = hash;
    }

    pub fn set_root_hash(&mut self, hash: Hash) {
        self.root_hash = hash;
    }

    /// Returns the sibling hash at height `log2_size`. Fails with
    /// [`MerkleError::OutOfRange`] if `log2_size` is outside
    /// `[log2_target_size, log2_root_size)`.
    pub fn get_sibling_hash(&self, log2_size: u32) -> Result<Hash> {
        Ok(self.sibling_hashes[self.sibling_index(log2_size)?])
    }

    /// Sets the sibling hash at height `log2_size`. Fails with
    /// [`MerkleError::OutOfRange`] if `log2_size` is outside
    /// `[log2_target_size, log2_root_size)`.
    pub fn set_sibling_hash(&mut self, hash: Hash, log2_size: u32) -> Result<()> {
        let idx = self.sibling_index(log2_size)?;
        self.sibling_hashes[idx] = hash;
        Ok(())
    }

    fn sibling_index(&self, log2_size: u32) -> Result<usize> {
        if log2_size < self.log2_target_size || log2_size >= self.log2_root_size {
            return Err(MerkleError::OutOfRange(format!(
                "sibling log2_size {log2_size} is out of range [{}, {})",
                self.log2_target_size, self.log2_root_size
            )));
        }
        Ok((log2_size - self.log2_target_size) as usize)
    }

    /// Recomputes the root from `target_hash` and the sibling hashes and
    /// compares it against `root_hash`.
    #[tracing::instrument(level = "trace", skip_all, fields(log2_root_size = self.log2_root_size, log2_target_size = self.log2_target_size))]
    pub fn verify(&self) -> bool {
        self.rebuild_root(self.log2_root_size)
            .map(|root| root == self.root_hash)
            .unwrap_or(false)
    }

    /// Folds `target_hash` up through the sibling hashes up to (but not
    /// including) height `up_to_log2_size`, returning the resulting node
    /// hash. Used by both `verify` (folding all the way to the root) and
    /// `slice` (folding partway, to a new target or a new root).
    fn rebuild_root(&self, up_to_log2_size: u32) -> Result<Hash> {
        let mut hash = self.target_hash;
        for i in self.log2_target_size..up_to_log2_size {
            let sibling = self.get_sibling_hash(i)?;
            let bit_set = (self.target_address >> i) & 1 != 0;
            hash = if bit_set {
                concat_hash(&sibling, &hash)
            } else {
                concat_hash(&hash, &sibling)
            };
        }
        Ok(hash)
    }

    /// Restricts this proof to a new `(new_log2_root, new_log2_target)`
    /// range nested within `[log2_target_size, log2_root_size]`.
    ///
    /// The new target's hash is obtained by folding the current target
    /// hash up through the siblings between `log2_target_size` and
    /// `new_log2_target`; the new root's hash is obtained the same way, by
    /// continuing the fold up to `new_log2_root`.
    pub fn slice(&self, new_log2_root: u32, new_log2_target: u32) -> Result<Proof> {
        if !(self.log2_target_size <= new_log2_target
            && new_log2_target <= new_log2_root
            && new_log2_root <= self.log2_root_size)
        {
            return Err(MerkleError::OutOfRange(format!(
                "({new_log2_root}, {new_log2_target}) is not nested in ({}, {})",
                self.log2_root_size, self.log2_target_size
            )));
        }

        let new_target_hash = self.rebuild_root(new_log2_target)?;
        let new_root_hash = self.rebuild_root(new_log2_root)?;
        let new_target_address = (self.target_address >> new_log2_target) << new_log2_target;

        let mut sliced = Proof::new(new_log2_root, new_log2_target)?;
        sliced.set_target_address(new_target_address)?;
        sliced.set_target_hash(new_target_hash);
        sliced.set_root_hash(new_root_hash);
        for log2_size in new_log2_target..new_log2_root {
            sliced.set_sibling_hash(self.get_sibling_hash(log2_size)?, log2_size)?;
        }
        Ok(sliced)
    }
}

/// Assembles a [`Proof`] from a sibling list ordered the way an external
/// collaborator (e.g. a protobuf `MerkleTreeProof` message) supplies it:
/// decreasing `log2_size`, with index `k` corresponding to
/// `log2_size = log2_root_size - 1 - k`.
///
/// Fails with [`MerkleError::InvalidArgument`] if `siblings.len() !=
/// log2_root_size - log2_target_size`.
pub fn proof_from_sibling_list(
    log2_root_size: u32,
    log2_target_size: u32,
    target_address: u64,
    target_hash: Hash,
    root_hash: Hash,
    siblings: &[Hash],
) -> Result<Proof> {
    let expected_len = log2_root_size
        .checked_sub(log2_target_size)
        .ok_or_else(|| {
            MerkleError::InvalidArgument(format!(
                "log2_target_size {log2_target_size} is greater than log2_root_size {log2_root_size}"
            ))
        })? as usize;
    if siblings.len() != expected_len {
        return Err(MerkleError::InvalidArgument(format!(
            "expected {expected_len} sibling hashes, got {}",
            siblings.len()
        )));
    }

    let mut proof = Proof::new(log2_root_size, log2_target_size)?;
    proof.set_target_address(target_address)?;
    proof.set_target_hash(target_hash);
    proof.set_root_hash(root_hash);
    for (k, sibling) in siblings.iter().enumerate() {
        let log2_size = log2_root_size - 1 - k as u32;
        proof.set_sibling_hash(*sibling, log2_size)?;
    }
    Ok(proof)
}

/// Serialises a [`Proof`]'s sibling hashes into the external decreasing
/// `log2_size` order consumed by [`proof_from_sibling_list`].
pub fn proof_to_sibling_list(proof: &Proof) -> Vec<Hash> {
    (proof.log2_target_size..proof.log2_root_size)
        .rev()
        .map(|log2_size| {
            proof
                .get_sibling_hash(log2_size)
                .expect("log2_size is within [log2_target_size, log2_root_size) by construction")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_word;
    use crate::pristine::PristineTree;

    fn example_proof() -> Proof {
        // A 3-level proof (log2_root=3, log2_target=0) over 8 one-byte leaves,
        // all zero except the target, built by hand.
        let leaves: Vec<Hash> = (0u8..8).map(|i| hash_word(&[i])).collect();
        let l01 = concat_hash(&leaves[0], &leaves[1]);
        let l23 = concat_hash(&leaves[2], &leaves[3]);
        let l0123 = concat_hash(&l01, &l23);
        let l45 = concat_hash(&leaves[4], &leaves[5]);
        let l67 = concat_hash(&leaves[6], &leaves[7]);
        let l4567 = concat_hash(&l45, &l67);
        let root = concat_hash(&l0123, &l4567);

        let mut p = Proof::new(3, 0).unwrap();
        p.set_target_address(0).unwrap();
        p.set_target_hash(leaves[0]);
        p.set_root_hash(root);
        p.set_sibling_hash(leaves[1], 0).unwrap();
        p.set_sibling_hash(l23, 1).unwrap();
        p.set_sibling_hash(l4567, 2).unwrap();
        p
    }

    #[test]
    fn verifies_correctly_built_proof() {
        assert!(example_proof().verify());
    }

    #[test]
    fn tampered_sibling_fails_verification() {
        let mut p = example_proof();
        p.set_sibling_hash(Hash::ZERO, 1).unwrap();
        assert!(!p.verify());
    }

    #[test]
    fn sibling_access_out_of_range_fails() {
        let p = example_proof();
        assert!(p.get_sibling_hash(3).is_err()); // == log2_root_size, excluded
        assert!(matches!(
            Proof::new(3, 0).unwrap().set_sibling_hash(Hash::ZERO, 3),
            Err(MerkleError::OutOfRange(_))
        ));
    }

    #[test]
    fn construction_rejects_target_above_root() {
        assert!(Proof::new(2, 3).is_err());
    }

    #[test]
    fn misaligned_target_address_rejected() {
        let mut p = Proof::new(3, 1).unwrap();
        assert!(p.set_target_address(1).is_err());
        assert!(p.set_target_address(2).is_ok());
    }

    #[test]
    fn slice_to_same_range_is_identity() {
        let p = example_proof();
        let sliced = p.slice(3, 0).unwrap();
        assert_eq!(sliced, p);
    }

    #[test]
    fn slice_to_narrower_range_produces_verifiable_sub_proof() {
        let p = example_proof();
        let sliced = p.slice(2, 0).unwrap();
        assert!(sliced.verify());
        assert_eq!(sliced.target_hash(), p.target_hash());
    }

    #[test]
    fn slice_rejects_non_nested_range() {
        let p = example_proof();
        assert!(p.slice(4, 0).is_err());
        assert!(p.slice(1, 2).is_err());
    }

    #[test]
    fn sibling_list_round_trips() {
        let p = example_proof();
        let siblings = proof_to_sibling_list(&p);
        assert_eq!(siblings.len(), 3);

        let rebuilt = proof_from_sibling_list(
            p.log2_root_size(),
            p.log2_target_size(),
            p.target_address(),
            p.target_hash(),
            p.root_hash(),
            &siblings,
        )
        .unwrap();
        assert_eq!(rebuilt, p);
    }

    #[test]
    fn sibling_list_wrong_length_is_invalid_argument() {
        let p = example_proof();
        let mut siblings = proof_to_sibling_list(&p);
        siblings.pop();
        let err = proof_from_sibling_list(
            p.log2_root_size(),
            p.log2_target_size(),
            p.target_address(),
            p.target_hash(),
            p.root_hash(),
            &siblings,
        )
        .unwrap_err();
        assert!(matches!(err, MerkleError::InvalidArgument(_)));
    }

    #[test]
    fn sibling_list_target_above_root_is_invalid_argument_not_a_panic() {
        let err = proof_from_sibling_list(3, 5, 0, Hash::ZERO, Hash::ZERO, &[]).unwrap_err();
        assert!(matches!(err, MerkleError::InvalidArgument(_)));
    }

    #[test]
    fn proof_against_pristine_target_verifies() {
        let pristine = PristineTree::new(5, 3).unwrap();
        let mut p = Proof::new(5, 3).unwrap();
        p.set_target_address(0).unwrap();
        p.set_target_hash(pristine.get_hash(3).unwrap());
        let mut hash = pristine.get_hash(3).unwrap();
        for i in 3..5 {
            let sib = pristine.get_hash(i).unwrap();
            p.set_sibling_hash(sib, i).unwrap();
            hash = concat_hash(&hash, &sib);
        }
        p.set_root_hash(hash);
        assert!(p.verify());
    }
}
