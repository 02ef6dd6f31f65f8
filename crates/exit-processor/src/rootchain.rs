//! Root-chain events and contract statuses fed to the core.
//!
//! The driver polls the root contract, decodes its logs and the matching getter structs,
//! and hands them here as plain values, serialised by root-chain height. The core never
//! sees the contract itself.

use ethereum_types::{Address, H256, U256};
use plasma_watcher_primitives::{constants::CONTRACT_ID_SIZE, position::Position};
use plasma_watcher_tx::Signature;
use serde::{Deserialize, Serialize};

/// The 192-bit identifier the root contract assigns to an in-flight exit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId(pub [u8; CONTRACT_ID_SIZE]);

impl std::fmt::Debug for ContractId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContractId(0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// A `ExitStarted` log from the root contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitStarted {
    /// The root-chain height the log was mined at.
    pub eth_height: u64,

    /// The packed position of the exiting UTXO.
    pub utxo_pos: u128,

    /// The raw encoding of the transaction that created the exiting output.
    pub output_tx: Vec<u8>,
}

/// The standard-exit struct read back from the contract for one started exit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandardExitStatus {
    /// The address the contract will pay out to; zero once the exit was challenged
    /// or finalized.
    pub exit_target: Address,

    /// The amount the contract holds for this exit.
    pub amount: U256,
}

/// An `InFlightExitStarted` log plus its call data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlightExitStarted {
    /// The root-chain height the log was mined at.
    pub eth_height: u64,

    /// The raw encoding of the exiting transaction.
    pub tx_bytes: Vec<u8>,

    /// One signature per input of the exiting transaction.
    pub sigs: Vec<Signature>,
}

/// The in-flight-exit struct read back from the contract for one started exit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlightExitStatus {
    /// The root-chain timestamp the exit started at; zero means not started.
    pub timestamp: u64,

    /// The identifier the contract tracks the exit under.
    pub contract_id: ContractId,
}

/// A piggyback log: an owner claimed one input or output slot of an in-flight exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PiggybackEvent {
    /// The raw hash of the in-flight transaction.
    pub tx_hash: H256,

    /// The claimed slot: `[0, 3]` inputs, `[4, 7]` outputs.
    pub output_index: u8,
}

/// An `InFlightExitChallenged` log: a competitor was presented against an IFE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IfeChallenged {
    /// The raw hash of the challenged in-flight transaction.
    pub tx_hash: H256,

    /// The packed position the challenger claimed for the competitor, zero if the
    /// competitor was never included.
    pub competitor_position: u128,

    /// The raw encoding of the competing transaction.
    pub competing_tx: Vec<u8>,

    /// The competitor's input slot that double-spends the in-flight transaction.
    pub competing_input_index: u8,

    /// The signature over the competing transaction at that slot.
    pub competing_sig: Signature,
}

/// An `InFlightExitChallengeResponded` log: the exiter proved canonicity on-chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IfeChallengeResponded {
    /// The raw hash of the in-flight transaction whose challenge was answered.
    pub tx_hash: H256,
}

/// An `ExitChallenged` log: a standard exit was proven spent and removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitChallenged {
    /// The packed position of the challenged exit.
    pub utxo_pos: u128,
}

/// One slot of an in-flight exit finalized by the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IfeFinalized {
    /// The identifier the contract tracks the exit under.
    pub contract_id: ContractId,

    /// The finalized slot: `[0, 3]` inputs, `[4, 7]` outputs.
    pub output_index: u8,
}

/// The positions to exit per in-flight exit, as computed by the finalization dry run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IfeExitSlots {
    /// Input positions to exit, for finalized slots `[0, 3]`.
    pub inputs: Vec<Position>,

    /// Output slots to exit, for finalized slots `[4, 7]`, as `(tx hash, slot)` pairs.
    pub outputs: Vec<(H256, u8)>,
}
