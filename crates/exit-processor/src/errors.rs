//! Error types for the exit processor.

use std::collections::BTreeSet;

use ethereum_types::H256;
use plasma_watcher_primitives::position::Position;
use plasma_watcher_tx::TxError;
use thiserror::Error;

use crate::rootchain::ContractId;

/// Errors surfaced by the ingest operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The event list and the contract status list differ in length.
    #[error("events and contract statuses differ in length")]
    UnexpectedEvents,

    /// A finalization referenced in-flight exits the core has never seen.
    #[error("unknown in-flight exits: {ids:?}")]
    UnknownInFlightExit {
        /// The contract identifiers that did not resolve.
        ids: BTreeSet<ContractId>,
    },

    /// A finalization referenced exit slots that were never piggybacked.
    #[error("unknown piggybacks: {slots:?}")]
    UnknownPiggybacks {
        /// The `(contract id, slot)` pairs that did not resolve.
        slots: Vec<(ContractId, u8)>,
    },

    /// An event referenced an in-flight exit transaction the core has never seen.
    #[error("no in-flight exit known for transaction {tx_hash:?}")]
    IfeNotKnownForTx {
        /// The raw transaction hash that did not resolve.
        tx_hash: H256,
    },

    /// An event carried a packed position whose components are out of range.
    #[error("malformed packed position: {0}")]
    MalformedPosition(u128),

    /// A standard-exit event pointed at an output slot the referenced transaction does
    /// not have.
    #[error("transaction creating {utxo_pos} has no such output")]
    MissingOutput {
        /// The exiting position.
        utxo_pos: Position,
    },

    /// A transaction carried by an event failed to decode or recover.
    #[error(transparent)]
    Tx(#[from] TxError),
}

/// Errors surfaced by challenge-data assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChallengeError {
    /// No known transaction double-spends an input of the in-flight exit.
    #[error("no competitor found for the in-flight exit")]
    CompetitorNotFound,

    /// The in-flight transaction does not appear in any fetched block.
    #[error("no inclusion found to prove canonicity")]
    CanonicalNotFound,

    /// The requested piggyback slot has no proven double-spend.
    #[error("no double-spend on the requested piggyback")]
    NoDoubleSpendOnParticularPiggyback,

    /// The requested piggyback index lies outside the contract arity.
    #[error("piggybacked index out of range: {index}")]
    PiggybackedIndexOutOfRange {
        /// The offending index.
        index: u8,
    },

    /// The referenced in-flight exit is not known to the core.
    #[error("no in-flight exit known for transaction {tx_hash:?}")]
    IfeNotKnownForTx {
        /// The raw transaction hash that did not resolve.
        tx_hash: H256,
    },

    /// The referenced standard exit is not known to the core.
    #[error("no active standard exit at {utxo_pos}")]
    ExitNotFound {
        /// The position queried.
        utxo_pos: Position,
    },

    /// The exiting UTXO was not spent in the supplied block.
    #[error("exiting utxo not spent in the supplied block")]
    UtxoNotSpent,

    /// The supplied transaction bytes failed to decode.
    #[error(transparent)]
    Tx(#[from] TxError),
}
