//! The events the core surfaces to downstream consumers.
//!
//! Everything the watcher can say about the chain is one of these variants, so the
//! dispatch boundary in the driver gets exhaustiveness checking for free.

use ethereum_types::{Address, U256};
use plasma_watcher_primitives::position::Position;
use serde::Serialize;

/// The overall verdict of a validity cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ChainStatus {
    /// No condition requiring a mass exit was found.
    #[default]
    Ok,

    /// An invalid exit has stayed unchallenged past the SLA margin; the chain must be
    /// abandoned.
    UnchallengedExit,
}

/// The exit fields shared by invalid-exit and unchallenged-exit notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ExitNotification {
    /// The exiting position.
    pub utxo_pos: Position,

    /// The exiting owner.
    pub owner: Address,

    /// The exited token, zero for ether.
    pub currency: Address,

    /// The exited amount.
    pub amount: U256,

    /// The root-chain height the exit started at.
    pub eth_height: u64,
}

/// One piggyback slot available to (or claimed by) an owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PiggybackSlot {
    /// The input or output index within the transaction.
    pub index: u8,

    /// The address entitled to piggyback the slot.
    pub address: Address,
}

/// An actionable observation emitted by the core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Event {
    /// An active standard exit spends a UTXO that no longer exists; it must be
    /// challenged.
    InvalidExit(ExitNotification),

    /// An invalid exit crossed the SLA margin unchallenged.
    UnchallengedExit(ExitNotification),

    /// A presumed-canonical in-flight exit has a known competitor; it must be challenged
    /// as non-canonical.
    NonCanonicalIfe {
        /// The raw encoding of the in-flight transaction.
        txbytes: Vec<u8>,
    },

    /// A non-canonical in-flight exit is actually included in a child block; the
    /// canonicity challenge must be answered.
    InvalidIfeChallenge {
        /// The raw encoding of the in-flight transaction.
        txbytes: Vec<u8>,
    },

    /// Piggybacked slots of an in-flight exit are proven double-spent.
    InvalidPiggyback {
        /// The raw encoding of the in-flight transaction.
        txbytes: Vec<u8>,

        /// The double-spent input slots.
        inputs: Vec<u8>,

        /// The double-spent output slots.
        outputs: Vec<u8>,
    },

    /// An in-flight exit accepts further piggybacks.
    PiggybackAvailable {
        /// The raw encoding of the in-flight transaction.
        txbytes: Vec<u8>,

        /// Input slots not yet piggybacked, with their spenders.
        available_inputs: Vec<PiggybackSlot>,

        /// Output slots not yet piggybacked, with their owners.
        available_outputs: Vec<PiggybackSlot>,
    },

    /// A valid standard exit finalized; the UTXO left the child chain.
    ExitFinalized {
        /// The exited position.
        utxo_pos: Position,

        /// The exiting owner.
        owner: Address,

        /// The exited token, zero for ether.
        currency: Address,

        /// The exited amount.
        amount: U256,
    },
}
