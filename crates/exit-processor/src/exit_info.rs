//! The record kept for one standard exit.

use ethereum_types::{Address, U256};
use plasma_watcher_db::ExitBlob;
use plasma_watcher_primitives::position::Position;
use plasma_watcher_tx::Transaction;

use crate::{
    errors::CoreError,
    events::ExitNotification,
    rootchain::{ExitStarted, StandardExitStatus},
};

/// One standard UTXO exit tracked by the core, keyed by its [`Position`].
///
/// Once `is_active` is `true` it stays `true` until the exit is removed by a successful
/// challenge or a valid finalization; an invalid finalization re-activates it so the exit
/// keeps producing byzantine events forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitInfo {
    /// The exiting amount.
    pub amount: U256,

    /// The exited token, zero for ether.
    pub currency: Address,

    /// The exiting owner.
    pub owner: Address,

    /// Whether the exit is live on the contract.
    pub is_active: bool,

    /// The root-chain height the exit started at.
    pub eth_height: u64,
}

impl ExitInfo {
    /// Builds the record from a started-exit log and the matching contract status.
    ///
    /// The output fields come from the transaction that created the exiting UTXO; the
    /// activity flag comes from the contract, which zeroes the exit target of exits it
    /// no longer considers live.
    pub fn from_event(
        event: &ExitStarted,
        status: &StandardExitStatus,
    ) -> Result<(Position, ExitInfo), CoreError> {
        let utxo_pos = Position::decode(event.utxo_pos)
            .map_err(|_| CoreError::MalformedPosition(event.utxo_pos))?;
        let tx = Transaction::decode(&event.output_tx)?;
        let output = tx
            .outputs
            .get(utxo_pos.oindex as usize)
            .ok_or(CoreError::MissingOutput { utxo_pos })?;

        let info = ExitInfo {
            amount: output.amount,
            currency: output.currency,
            owner: output.owner,
            is_active: !status.exit_target.is_zero(),
            eth_height: event.eth_height,
        };
        Ok((utxo_pos, info))
    }

    /// The notification payload for this exit.
    pub fn notification(&self, utxo_pos: Position) -> ExitNotification {
        ExitNotification {
            utxo_pos,
            owner: self.owner,
            currency: self.currency,
            amount: self.amount,
            eth_height: self.eth_height,
        }
    }

    /// The stored form of this record.
    pub fn to_blob(&self) -> ExitBlob {
        ExitBlob {
            amount: self.amount,
            currency: self.currency,
            owner: self.owner,
            is_active: self.is_active,
            eth_height: self.eth_height,
        }
    }

    /// Rebuilds the record from its stored form.
    pub fn from_blob(blob: &ExitBlob) -> Self {
        ExitInfo {
            amount: blob.amount,
            currency: blob.currency,
            owner: blob.owner,
            is_active: blob.is_active,
            eth_height: blob.eth_height,
        }
    }
}
