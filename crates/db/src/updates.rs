//! The persistence deltas emitted by the core and the blob form of each record.
//!
//! Blobs are plain serde values; the backing store chooses the wire format. Keys travel
//! next to the blob so a batch can be applied without decoding anything.

use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// Stored form of one standard exit, keyed by its packed UTXO position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitBlob {
    /// The amount exited.
    pub amount: U256,

    /// The token being exited, zero for ether.
    pub currency: Address,

    /// The exiting owner.
    pub owner: Address,

    /// Whether the exit is live on the contract.
    pub is_active: bool,

    /// The root-chain height at which the exit started.
    pub eth_height: u64,
}

/// Stored form of one in-flight exit, keyed by the raw transaction hash.
///
/// The inclusion witness discovered by block scanning is deliberately absent: it is
/// in-memory state and is rediscovered after a restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InFlightExitBlob {
    /// The signed-transaction encoding of the exiting transaction.
    pub tx_bytes: Vec<u8>,

    /// The 192-bit identifier the root contract tracks this exit under.
    pub contract_id: [u8; 24],

    /// The root-chain timestamp at which the exit started, zero if never started.
    pub timestamp: u64,

    /// The root-chain height at which the exit started.
    pub eth_height: u64,

    /// Whether the exit is live on the contract.
    pub is_active: bool,

    /// Whether the exiting transaction is currently presumed canonical.
    pub is_canonical: bool,

    /// Bitmap of piggybacked input slots.
    pub piggybacked_inputs: u8,

    /// Bitmap of piggybacked output slots.
    pub piggybacked_outputs: u8,

    /// Bitmap of slots already finalized by the contract.
    pub exit_map: u8,

    /// The packed position of the oldest known competitor, if any was presented.
    pub oldest_competitor: Option<u128>,
}

/// Stored form of one known competitor, keyed by the competitor's raw transaction hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorBlob {
    /// The raw encoding of the competing transaction.
    pub tx_bytes: Vec<u8>,

    /// The input slot of the in-flight transaction the competitor double-spends.
    pub competing_input_index: u8,

    /// The 65-byte signature presented on-chain for that slot.
    pub competing_sig: Vec<u8>,
}

/// One persistence delta. The driver must apply a returned batch atomically with its
/// acceptance of the ingest call, or a restart will diverge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DbUpdate {
    /// Insert or overwrite a standard exit.
    PutExit {
        /// The packed UTXO position key.
        position: u128,
        /// The record to store.
        exit: ExitBlob,
    },

    /// Remove a standard exit.
    DeleteExit {
        /// The packed UTXO position key.
        position: u128,
    },

    /// Insert or overwrite an in-flight exit.
    PutInFlightExit {
        /// The raw transaction hash key.
        tx_hash: H256,
        /// The record to store.
        exit: InFlightExitBlob,
    },

    /// Insert or overwrite a competitor.
    PutCompetitor {
        /// The competitor's raw transaction hash key.
        tx_hash: H256,
        /// The record to store.
        competitor: CompetitorBlob,
    },
}
