//! The request value threaded through one validity cycle.
//!
//! A cycle alternates between the core planning queries and the driver answering them:
//! the core fills the `*_to_check` / `*_to_get` fields, the driver copies the
//! collaborators' answers into the matching `*_result` fields, and the populated request
//! is finally handed to the validity analysis. The core only ever reads what a phase
//! needs, so a driver may skip phases that planned no work.

use std::collections::BTreeMap;

use plasma_watcher_primitives::position::Position;

use crate::collaborators::Block;

/// The immutable inputs and accumulated answers of one validity cycle.
#[derive(Clone, Debug, Default)]
pub struct Request {
    /// The current root-chain height.
    pub eth_height_now: u64,

    /// The child-chain horizon: positions at or above this block are not checked.
    pub blknum_now: u64,

    /// Positions whose existence the ledger must answer.
    pub utxos_to_check: Vec<Position>,

    /// The ledger's answers, parallel to `utxos_to_check`.
    pub utxo_exists_result: Vec<bool>,

    /// Positions whose spending block the ledger must answer.
    pub spends_to_get: Vec<Position>,

    /// The ledger's answers, parallel to `spends_to_get`.
    pub spent_blknum_result: Vec<Option<u64>>,

    /// Block numbers the block store must fetch.
    pub blknums_to_get: Vec<u64>,

    /// The fetched blocks.
    pub blocks_result: Vec<Block>,

    /// Existence queries for the inputs of in-flight exits with piggybacked outputs.
    pub ife_input_utxos_to_check: Vec<Position>,

    /// The ledger's answers, parallel to `ife_input_utxos_to_check`.
    pub ife_input_utxo_exists_result: Vec<bool>,

    /// Spend queries derived from missing in-flight exit inputs.
    pub ife_input_spends_to_get: Vec<Position>,

    /// The ledger's answers, parallel to `ife_input_spends_to_get`.
    pub ife_input_spent_blknum_result: Vec<Option<u64>>,

    /// Block numbers in which in-flight exit inputs were spent.
    pub ife_input_blknums_to_get: Vec<u64>,

    /// The fetched blocks in which in-flight transactions may have been included.
    pub ife_input_spending_blocks_result: Vec<Block>,
}

impl Request {
    /// Starts a cycle at the given chain coordinates.
    pub fn new(eth_height_now: u64, blknum_now: u64) -> Self {
        Request {
            eth_height_now,
            blknum_now,
            ..Default::default()
        }
    }

    /// The existence answers keyed by position. A position that was never checked is
    /// treated as existing.
    pub fn utxo_exists_map(&self) -> BTreeMap<Position, bool> {
        self.utxos_to_check
            .iter()
            .copied()
            .zip(self.utxo_exists_result.iter().copied())
            .collect()
    }

    /// As [`Request::utxo_exists_map`], for the in-flight input phase.
    pub fn ife_input_utxo_exists_map(&self) -> BTreeMap<Position, bool> {
        self.ife_input_utxos_to_check
            .iter()
            .copied()
            .zip(self.ife_input_utxo_exists_result.iter().copied())
            .collect()
    }
}
