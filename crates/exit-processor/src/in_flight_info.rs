//! The record kept for one in-flight exit.

use ethereum_types::H256;
use plasma_watcher_db::InFlightExitBlob;
use plasma_watcher_primitives::{
    constants::{MAX_INPUTS, MAX_OUTPUTS},
    position::Position,
};
use plasma_watcher_tx::{recover::recover_spenders, Signed, Transaction};

use crate::{
    errors::CoreError,
    rootchain::{ContractId, InFlightExitStarted, InFlightExitStatus},
};

/// One in-flight exit tracked by the core, keyed by the raw hash of its transaction.
///
/// The record is never removed while active: it must keep producing events as long as the
/// contract considers the exit live. Canonicity starts presumed (`true`), flips on the
/// first accepted competitor challenge and flips back if the exiter proves inclusion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlightExitInfo {
    /// The exiting transaction with its per-input signatures.
    pub tx: Signed,

    /// The identifier the root contract tracks this exit under.
    pub contract_id: ContractId,

    /// The root-chain timestamp the exit started at.
    pub timestamp: u64,

    /// The root-chain height the exit started at.
    pub eth_height: u64,

    /// Whether the exit is live on the contract.
    pub is_active: bool,

    /// Whether the exiting transaction is currently presumed canonical.
    pub is_canonical: bool,

    /// Bitmap of piggybacked input slots.
    pub piggybacked_inputs: u8,

    /// Bitmap of piggybacked output slots.
    pub piggybacked_outputs: u8,

    /// Bitmap of slots the contract has finalized.
    pub exit_map: u8,

    /// The position of the oldest competitor presented on-chain, if any.
    pub oldest_competitor: Option<Position>,

    /// Where the exiting transaction was seen in a child block, with its inclusion
    /// proof. Discovered by block scanning; in-memory only, never persisted.
    pub tx_seen_in_blocks_at: Option<(Position, Vec<u8>)>,
}

impl InFlightExitInfo {
    /// Builds the record from a started-exit log and the matching contract status.
    ///
    /// The signatures are checked for recoverability here so that later analysis can rely
    /// on them: the contract would have rejected the exit otherwise.
    pub fn from_event(
        event: &InFlightExitStarted,
        status: &InFlightExitStatus,
    ) -> Result<Self, CoreError> {
        let raw = Transaction::decode(&event.tx_bytes)?;
        let tx = Signed::new(raw, event.sigs.clone());
        recover_spenders(&tx)?;

        Ok(InFlightExitInfo {
            tx,
            contract_id: status.contract_id,
            timestamp: status.timestamp,
            eth_height: event.eth_height,
            is_active: status.timestamp != 0,
            is_canonical: true,
            piggybacked_inputs: 0,
            piggybacked_outputs: 0,
            exit_map: 0,
            oldest_competitor: None,
            tx_seen_in_blocks_at: None,
        })
    }

    /// The raw hash of the exiting transaction, the key of this record.
    pub fn raw_hash(&self) -> H256 {
        self.tx.raw.raw_hash()
    }

    /// Returns `true` if the slot is currently piggybacked.
    pub fn is_piggybacked(&self, index: u8) -> bool {
        let (bitmap, bit) = self.slot_bit(index);
        bitmap & bit != 0
    }

    /// Sets the piggyback bit for `index`. Returns `false` if it was already set.
    pub fn piggyback(&mut self, index: u8) -> bool {
        if self.is_piggybacked(index) {
            return false;
        }
        let bit = self.slot_bit(index).1;
        if Position::is_input_slot(index) {
            self.piggybacked_inputs |= bit;
        } else {
            self.piggybacked_outputs |= bit;
        }
        true
    }

    /// Clears the piggyback bit for `index`. Returns `false` if it was not set.
    pub fn challenge_piggyback(&mut self, index: u8) -> bool {
        if !self.is_piggybacked(index) {
            return false;
        }
        let bit = self.slot_bit(index).1;
        if Position::is_input_slot(index) {
            self.piggybacked_inputs &= !bit;
        } else {
            self.piggybacked_outputs &= !bit;
        }
        true
    }

    /// Marks a slot finalized by the contract: records it in the exit map and releases
    /// its piggyback.
    pub fn finalize_slot(&mut self, index: u8) {
        let bit = self.slot_bit(index).1;
        if Position::is_input_slot(index) {
            self.exit_map |= bit;
        } else {
            self.exit_map |= bit << MAX_INPUTS;
        }
        self.challenge_piggyback(index);
    }

    /// The piggybacked input indices, `[0, 3]`.
    pub fn piggybacked_input_indices(&self) -> Vec<u8> {
        (0..MAX_INPUTS as u8)
            .filter(|index| self.is_piggybacked(*index))
            .collect()
    }

    /// The piggybacked output indices, `[0, 3]`.
    pub fn piggybacked_output_indices(&self) -> Vec<u8> {
        (0..MAX_OUTPUTS as u8)
            .filter(|index| self.is_piggybacked(MAX_INPUTS as u8 + index))
            .collect()
    }

    /// The positions of the piggybacked outputs, known only once the transaction has
    /// been seen in a block.
    pub fn piggybacked_output_positions(&self) -> Vec<Position> {
        let Some((seen_at, _)) = &self.tx_seen_in_blocks_at else {
            return Vec::new();
        };
        self.piggybacked_output_indices()
            .into_iter()
            .map(|index| Position::new(seen_at.blknum, seen_at.txindex, index))
            .collect()
    }

    /// The stored form of this record. The inclusion witness is deliberately left out:
    /// it is rediscovered from blocks after a restart.
    pub fn to_blob(&self) -> InFlightExitBlob {
        InFlightExitBlob {
            tx_bytes: self.tx.encode(),
            contract_id: self.contract_id.0,
            timestamp: self.timestamp,
            eth_height: self.eth_height,
            is_active: self.is_active,
            is_canonical: self.is_canonical,
            piggybacked_inputs: self.piggybacked_inputs,
            piggybacked_outputs: self.piggybacked_outputs,
            exit_map: self.exit_map,
            oldest_competitor: self.oldest_competitor.map(|pos| pos.encode()),
        }
    }

    /// Rebuilds the record from its stored form.
    pub fn from_blob(blob: &InFlightExitBlob) -> Result<Self, CoreError> {
        let oldest_competitor = blob
            .oldest_competitor
            .map(|packed| {
                Position::decode(packed).map_err(|_| CoreError::MalformedPosition(packed))
            })
            .transpose()?;

        Ok(InFlightExitInfo {
            tx: Signed::decode(&blob.tx_bytes)?,
            contract_id: ContractId(blob.contract_id),
            timestamp: blob.timestamp,
            eth_height: blob.eth_height,
            is_active: blob.is_active,
            is_canonical: blob.is_canonical,
            piggybacked_inputs: blob.piggybacked_inputs,
            piggybacked_outputs: blob.piggybacked_outputs,
            exit_map: blob.exit_map,
            oldest_competitor,
            tx_seen_in_blocks_at: None,
        })
    }

    // (bitmap, bit within that bitmap) for a slot index in [0, 8).
    fn slot_bit(&self, index: u8) -> (u8, u8) {
        debug_assert!((index as usize) < MAX_INPUTS + MAX_OUTPUTS);
        if Position::is_input_slot(index) {
            (self.piggybacked_inputs, 1 << index)
        } else {
            (self.piggybacked_outputs, 1 << (index as usize - MAX_INPUTS))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::fixtures;

    use super::*;

    #[test]
    fn piggyback_bits_are_per_slot() {
        let mut ife = fixtures::ife(&fixtures::signed_tx(
            vec![Position::new(1000, 0, 0)],
            vec![(0xaa, 10), (0xbb, 20)],
            &[1],
        ));

        assert!(ife.piggyback(0));
        assert!(ife.piggyback(4));
        assert!(ife.piggyback(5));
        assert!(!ife.piggyback(4), "piggybacking twice is a no-op");

        assert_eq!(ife.piggybacked_input_indices(), vec![0]);
        assert_eq!(ife.piggybacked_output_indices(), vec![0, 1]);

        assert!(ife.challenge_piggyback(4));
        assert!(!ife.challenge_piggyback(4));
        assert_eq!(ife.piggybacked_output_indices(), vec![1]);
    }

    #[test]
    fn finalizing_a_slot_releases_its_piggyback() {
        let mut ife = fixtures::ife(&fixtures::signed_tx(
            vec![Position::new(1000, 0, 0)],
            vec![(0xaa, 10)],
            &[1],
        ));
        ife.piggyback(4);
        ife.finalize_slot(4);
        assert!(!ife.is_piggybacked(4));
        assert_eq!(ife.exit_map, 1 << MAX_INPUTS);
    }

    #[test]
    fn output_positions_require_an_inclusion_witness() {
        let signed = fixtures::signed_tx(
            vec![Position::new(1000, 0, 0)],
            vec![(0xaa, 10), (0xbb, 20)],
            &[1],
        );
        let mut ife = fixtures::ife(&signed);
        ife.piggyback(5);
        assert!(ife.piggybacked_output_positions().is_empty());

        ife.tx_seen_in_blocks_at = Some((Position::new(3000, 7, 0), vec![0u8; 512]));
        assert_eq!(
            ife.piggybacked_output_positions(),
            vec![Position::new(3000, 7, 1)]
        );
    }

    #[test]
    fn blob_roundtrip_drops_the_witness() {
        let signed = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        let mut ife = fixtures::ife(&signed);
        ife.piggyback(0);
        ife.tx_seen_in_blocks_at = Some((Position::new(3000, 0, 0), vec![0u8; 512]));

        let restored = InFlightExitInfo::from_blob(&ife.to_blob()).unwrap();
        assert_eq!(restored.tx, ife.tx);
        assert_eq!(restored.piggybacked_inputs, ife.piggybacked_inputs);
        assert_eq!(restored.tx_seen_in_blocks_at, None);
    }
}
