//! Error types for the primitives.

use thiserror::Error;

/// Error decoding a packed UTXO position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PositionError {
    /// The block number component does not fit in a `u64`.
    #[error("block number component out of range")]
    BlknumOutOfRange,

    /// The output index component does not fit in a `u8`.
    #[error("output index component out of range: {0}")]
    OindexOutOfRange(u32),
}

/// Error constructing or querying a child-block Merkle tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MerkleError {
    /// More leaves were supplied than the fixed-depth tree can hold.
    #[error("too many leaves for a depth-{depth} tree: {count}")]
    TooManyLeaves {
        /// The depth of the tree.
        depth: usize,
        /// The number of leaves supplied.
        count: usize,
    },

    /// The requested leaf index lies outside the supplied leaves.
    #[error("leaf index {0} out of range")]
    LeafIndexOutOfRange(usize),
}
