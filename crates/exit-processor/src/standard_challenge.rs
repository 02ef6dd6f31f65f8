//! Challenge assembly for invalid standard exits.
//!
//! A standard exit is invalid when its UTXO was already spent on the child chain. The
//! driver asks the ledger which block spent it, fetches that block, and the core locates
//! the spending transaction and extracts the signature the contract verifies.

use plasma_watcher_primitives::position::Position;
use plasma_watcher_tx::{Signature, Signed};
use tracing::info;

use crate::{collaborators::Block, core::Core, errors::ChallengeError};

/// The evidence the contract accepts to challenge a standard exit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandardChallenge {
    /// The identifier of the challenged exit.
    pub exit_id: u128,

    /// The input slot of the spending transaction that consumes the exiting UTXO.
    pub input_index: u8,

    /// The raw encoding of the spending transaction.
    pub txbytes: Vec<u8>,

    /// The spender's signature over the spending transaction.
    pub sig: Signature,
}

impl Core {
    /// Plans the spend query for challenging the exit at `utxo_pos`: confirms the exit
    /// is tracked and active, and returns the position the ledger must be asked about.
    pub fn determine_standard_challenge_queries(
        &self,
        utxo_pos: Position,
    ) -> Result<Position, ChallengeError> {
        match self.exits().get(&utxo_pos) {
            Some(exit) if exit.is_active => Ok(utxo_pos),
            _ => Err(ChallengeError::ExitNotFound { utxo_pos }),
        }
    }

    /// Assembles the challenge from the block in which the ledger reported the exiting
    /// UTXO spent.
    pub fn create_standard_challenge(
        &self,
        utxo_pos: Position,
        block: &Block,
    ) -> Result<StandardChallenge, ChallengeError> {
        self.determine_standard_challenge_queries(utxo_pos)?;

        for tx_bytes in &block.transactions {
            let signed = Signed::decode(tx_bytes)
                .expect("transaction in a validated child block must decode");
            if let Some(input_index) = signed
                .raw
                .inputs
                .iter()
                .position(|input| *input == utxo_pos)
            {
                let sig = signed
                    .sigs
                    .get(input_index)
                    .copied()
                    .expect("spending transaction must carry a signature for each input");
                info!(%utxo_pos, blknum = block.number, "standard exit challenge assembled");
                return Ok(StandardChallenge {
                    exit_id: utxo_pos.exit_id(),
                    input_index: input_index as u8,
                    txbytes: signed.raw.encode(),
                    sig,
                });
            }
        }

        Err(ChallengeError::UtxoNotSpent)
    }
}
