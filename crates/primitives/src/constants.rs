//! Consensus constants shared with the root contract.
//!
//! These values are part of the packed UTXO position encoding and the transaction arity.
//! Changing them changes the meaning of every persisted position key, so they must match
//! the deployed root contract exactly.

/// The maximum number of inputs a child-chain transaction can have.
pub const MAX_INPUTS: usize = 4;

/// The maximum number of outputs a child-chain transaction can have.
pub const MAX_OUTPUTS: usize = 4;

/// The multiplier applied to the block number in the packed position encoding.
pub const BLOCK_OFFSET: u128 = 1_000_000_000;

/// The multiplier applied to the transaction index in the packed position encoding.
pub const TX_OFFSET: u128 = 10_000;

/// The number of transaction indices that fit in one block under the packed encoding.
pub const MAX_TXINDEX: u32 = (BLOCK_OFFSET / TX_OFFSET) as u32;

/// The size of a `(r || s || v)` transaction signature in bytes.
pub const SIGNATURE_SIZE: usize = 65;

/// The size of an in-flight exit contract identifier in bytes (192 bits).
pub const CONTRACT_ID_SIZE: usize = 24;
