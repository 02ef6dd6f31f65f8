//! The packed UTXO position.
//!
//! A position is the primary key over outputs of child-chain transactions. It packs into a
//! single integer with the same radixes the root contract uses, which is the form used for
//! persistence keys and for exit identifiers.

use proptest_derive::Arbitrary;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{BLOCK_OFFSET, MAX_INPUTS, TX_OFFSET},
    errors::PositionError,
};

/// A `(blknum, txindex, oindex)` coordinate of a single UTXO.
///
/// The derived ordering is the total order over `(blknum, txindex, oindex)`, i.e. the order
/// in which outputs were created on the child chain. A position with `blknum == 0` denotes
/// "no position": an empty input slot or a transaction not included in any block.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    Arbitrary,
)]
pub struct Position {
    /// The child-chain block number.
    pub blknum: u64,

    /// The index of the transaction within the block.
    #[proptest(strategy = "0..crate::constants::MAX_TXINDEX")]
    pub txindex: u32,

    /// The index of the output within the transaction.
    pub oindex: u8,
}

impl Position {
    /// The sentinel for "no position".
    pub const ZERO: Position = Position {
        blknum: 0,
        txindex: 0,
        oindex: 0,
    };

    /// Creates a position from its components.
    pub const fn new(blknum: u64, txindex: u32, oindex: u8) -> Self {
        Position {
            blknum,
            txindex,
            oindex,
        }
    }

    /// Returns `true` if this is the "no position" sentinel.
    pub const fn is_zero(&self) -> bool {
        self.blknum == 0 && self.txindex == 0 && self.oindex == 0
    }

    /// Packs the position into a single integer: `blknum * 10^9 + txindex * 10^4 + oindex`.
    pub const fn encode(&self) -> u128 {
        self.blknum as u128 * BLOCK_OFFSET + self.txindex as u128 * TX_OFFSET + self.oindex as u128
    }

    /// Inverse of [`Position::encode`].
    pub fn decode(packed: u128) -> Result<Self, PositionError> {
        let blknum = u64::try_from(packed / BLOCK_OFFSET)
            .map_err(|_| PositionError::BlknumOutOfRange)?;
        let txindex = ((packed % BLOCK_OFFSET) / TX_OFFSET) as u32;
        let oindex_raw = (packed % TX_OFFSET) as u32;
        let oindex =
            u8::try_from(oindex_raw).map_err(|_| PositionError::OindexOutOfRange(oindex_raw))?;

        Ok(Position {
            blknum,
            txindex,
            oindex,
        })
    }

    /// The identifier under which the root contract tracks an exit from this position.
    pub const fn exit_id(&self) -> u128 {
        self.encode()
    }

    /// Returns `true` if the oindex addresses an input slot of a piggybacked exit (`[0, 3]`)
    /// rather than an output slot (`[4, 7]`).
    pub const fn is_input_slot(index: u8) -> bool {
        (index as usize) < MAX_INPUTS
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.blknum, self.txindex, self.oindex)
    }
}
