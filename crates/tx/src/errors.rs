//! Error types for transaction decoding and signature recovery.

use thiserror::Error;

/// Error decoding a transaction or recovering its spenders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    /// The byte string is not a canonical transaction encoding.
    #[error("malformed transaction encoding: {0}")]
    Malformed(#[from] rlp::DecoderError),

    /// A populated slot follows an empty one; the canonical encoding packs populated
    /// slots as a prefix.
    #[error("non-canonical slot padding")]
    NonCanonicalPadding,

    /// More inputs or outputs than the contract permits.
    #[error("transaction arity exceeds contract maximum")]
    TooManySlots,

    /// A signature failed to recover to any address.
    #[error("invalid signature")]
    InvalidSignature,

    /// The number of signatures does not match the number of inputs.
    #[error("signature arity mismatch: {inputs} inputs, {sigs} signatures")]
    ArityMismatch {
        /// The number of inputs in the transaction.
        inputs: usize,
        /// The number of signatures supplied.
        sigs: usize,
    },
}
