//! The projection of all transactions known from in-flight exits.

use std::collections::BTreeMap;

use ethereum_types::H256;
use plasma_watcher_tx::Signed;

use crate::core::Core;

/// Every signed transaction the core knows from its in-flight exits, keyed by raw hash.
///
/// This is the off-chain half of the double-spend search substrate: a transaction that
/// exits in-flight is "known" even if it never appears in a block.
#[derive(Clone, Debug, Default)]
pub struct TxAppendix {
    txs: BTreeMap<H256, Signed>,
}

impl TxAppendix {
    /// Projects the appendix out of the current state.
    pub fn from_core(core: &Core) -> Self {
        TxAppendix {
            txs: core
                .in_flight_exits()
                .iter()
                .map(|(hash, ife)| (*hash, ife.tx.clone()))
                .collect(),
        }
    }

    /// Iterates the known transactions.
    pub fn iter(&self) -> impl Iterator<Item = (&H256, &Signed)> {
        self.txs.iter()
    }
}
