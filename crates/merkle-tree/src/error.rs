//! Error taxonomy for the Merkle tree engines.

use thiserror::Error;

/// Result type returned by every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, MerkleError>;

/// Errors produced by the pristine, back, and complete Merkle tree engines,
/// and by [`crate::proof::Proof`].
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum MerkleError {
    /// A size or index argument violates a tree or proof invariant: an
    /// out-of-order `log2` parameter, a misaligned address, an append past
    /// capacity, or a pristine query outside `[log2_word, log2_root]`.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A value crossing a boundary (a sibling list, a raw hash) has the
    /// wrong shape for the request it is attached to.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A proof built internally by this crate failed its own verification.
    /// Reaching this variant indicates a bug in this crate, not caller
    /// misuse; it is only ever raised from a debug-only self-check gated on
    /// `cfg!(debug_assertions)`.
    #[error("internal error: {0}")]
    Internal(String),
}
