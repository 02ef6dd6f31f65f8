//! The interfaces of the core's external collaborators.
//!
//! The driver implements these against real backends (a UTXO ledger, a block store) and
//! copies their answers into a [`Request`] between planning phases. The core itself never
//! performs the calls; the traits exist so that drivers and test harnesses agree on the
//! shapes.
//!
//! [`Request`]: crate::request::Request

use ethereum_types::H256;
use plasma_watcher_primitives::{
    errors::MerkleError,
    merkle::MerkleTree,
    position::Position,
};

/// A child-chain block as served by the block store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// The child-chain block number.
    pub number: u64,

    /// The root the contract committed to for this block.
    pub hash: H256,

    /// The signed-transaction encodings, in block order.
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    /// Assembles a block, computing the committed root from the transactions.
    pub fn new(number: u64, transactions: Vec<Vec<u8>>) -> Result<Self, MerkleError> {
        let hash = MerkleTree::new(&transactions)?.root();
        Ok(Block {
            number,
            hash,
            transactions,
        })
    }

    /// The Merkle inclusion proof for the transaction at `txindex`, checkable against
    /// [`Block::hash`].
    pub fn inclusion_proof(&self, txindex: usize) -> Result<Vec<u8>, MerkleError> {
        MerkleTree::new(&self.transactions)?.proof(txindex)
    }
}

/// The external owner of the canonical UTXO set.
pub trait Ledger {
    /// Whether each position is an unspent member of the UTXO set, parallel to the
    /// input slice.
    fn utxo_exists(&self, positions: &[Position]) -> Vec<bool>;

    /// The child-chain block in which the position was spent, if the ledger knows of
    /// the spend.
    fn spent_blknum(&self, position: Position) -> Option<u64>;
}

/// The external source of fetched child-chain blocks.
pub trait BlockStore {
    /// The blocks with the given numbers, `None` where a block is not (yet) known,
    /// parallel to the input slice.
    fn get_blocks(&self, blknums: &[u64]) -> Vec<Option<Block>>;
}
