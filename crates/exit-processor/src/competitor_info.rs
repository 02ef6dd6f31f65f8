//! The record kept for one known competitor of an in-flight exit.

use plasma_watcher_db::CompetitorBlob;
use plasma_watcher_tx::{Signature, Transaction};

use crate::{errors::CoreError, rootchain::IfeChallenged};

/// A competing transaction presented on-chain against an in-flight exit, keyed by the
/// competitor's raw transaction hash. Never removed: a competitor once seen stays known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompetitorInfo {
    /// The competing transaction. Only the signature named by the challenge is known,
    /// so the transaction is kept raw with that signature alongside.
    pub tx: Transaction,

    /// The competitor's input slot that double-spends the in-flight transaction.
    pub competing_input_index: u8,

    /// The signature over the competing transaction at that slot.
    pub competing_sig: Signature,
}

impl CompetitorInfo {
    /// Builds the record from a challenge log.
    pub fn from_event(event: &IfeChallenged) -> Result<Self, CoreError> {
        Ok(CompetitorInfo {
            tx: Transaction::decode(&event.competing_tx)?,
            competing_input_index: event.competing_input_index,
            competing_sig: event.competing_sig,
        })
    }

    /// The stored form of this record.
    pub fn to_blob(&self) -> CompetitorBlob {
        CompetitorBlob {
            tx_bytes: self.tx.encode(),
            competing_input_index: self.competing_input_index,
            competing_sig: self.competing_sig.as_bytes().to_vec(),
        }
    }

    /// Rebuilds the record from its stored form.
    pub fn from_blob(blob: &CompetitorBlob) -> Result<Self, CoreError> {
        Ok(CompetitorInfo {
            tx: Transaction::decode(&blob.tx_bytes)?,
            competing_input_index: blob.competing_input_index,
            competing_sig: Signature::from_slice(&blob.competing_sig)?,
        })
    }
}
