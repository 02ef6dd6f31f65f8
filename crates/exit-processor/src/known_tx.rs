//! The unified double-spend search substrate.
//!
//! A "known transaction" is any signed transaction observed either in the appendix of
//! in-flight exits or in a fetched child block, annotated with its inclusion position
//! where it has one. Every double-spend question the validity analysis and the challenge
//! assembly ask is answered by scanning this set.

use ethereum_types::H256;
use itertools::Itertools;
use plasma_watcher_primitives::position::Position;
use plasma_watcher_tx::Signed;

use crate::{collaborators::Block, tx_appendix::TxAppendix};

/// One known transaction, with its inclusion position if it came from a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnownTx {
    /// The signed transaction.
    pub signed: Signed,

    /// `(blknum, txindex, 0)` for block transactions, `None` for appendix ones.
    pub inclusion: Option<Position>,
}

impl KnownTx {
    /// The raw hash of the underlying transaction.
    pub fn raw_hash(&self) -> H256 {
        self.signed.raw.raw_hash()
    }

    /// The input slot of this transaction spending `position`, if any.
    pub fn spends(&self, position: Position) -> Option<u8> {
        self.signed
            .raw
            .inputs
            .iter()
            .position(|input| *input == position)
            .map(|index| index as u8)
    }
}

/// Collects the known-transaction set: fetched blocks first, ascending by block number
/// and transaction index, then the appendix. The block-first order is what makes "first
/// match" mean "oldest competitor" downstream.
///
/// # Panics
///
/// Panics on a transaction that fails to decode. Blocks handed to the core have already
/// passed child-block validation in the driver, so a malformed transaction here is a
/// driver bug.
pub fn collect(appendix: &TxAppendix, blocks: &[Block]) -> Vec<KnownTx> {
    let mut known = Vec::new();
    for block in blocks.iter().sorted_by_key(|block| block.number) {
        for (txindex, tx_bytes) in block.transactions.iter().enumerate() {
            let signed = Signed::decode(tx_bytes)
                .expect("transaction in a validated child block must decode");
            known.push(KnownTx {
                signed,
                inclusion: Some(Position::new(block.number, txindex as u32, 0)),
            });
        }
    }

    for (_, signed) in appendix.iter() {
        known.push(KnownTx {
            signed: signed.clone(),
            inclusion: None,
        });
    }

    known
}

/// One proven double-spend of a tracked slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DoubleSpend<'a> {
    /// The tracked slot index within the owning transaction.
    pub slot_index: u8,

    /// The double-spent position.
    pub utxo_pos: Position,

    /// The input slot of the known transaction that spends the position.
    pub known_spent_index: u8,

    /// The known transaction that spends the position.
    pub known_tx: &'a KnownTx,
}

/// Finds, for each tracked `(slot, position)` pair, every known transaction other than
/// `owner_hash` that also spends the position. Results preserve the order of `known`.
pub fn double_spends<'a>(
    slots: &[(u8, Position)],
    owner_hash: H256,
    known: &'a [KnownTx],
) -> Vec<DoubleSpend<'a>> {
    let mut found = Vec::new();
    for known_tx in known {
        if known_tx.raw_hash() == owner_hash {
            continue;
        }
        for (slot_index, utxo_pos) in slots {
            if let Some(known_spent_index) = known_tx.spends(*utxo_pos) {
                found.push(DoubleSpend {
                    slot_index: *slot_index,
                    utxo_pos: *utxo_pos,
                    known_spent_index,
                    known_tx,
                });
            }
        }
    }
    found
}
