//! In-memory implementation of the storage capability, for tests and local drivers.

use std::collections::BTreeMap;

use ethereum_types::H256;

use crate::{
    errors::DbResult,
    persistence::{PersistedState, Persistence},
    updates::{CompetitorBlob, DbUpdate, ExitBlob, InFlightExitBlob},
};

/// A [`Persistence`] backed by ordinary maps.
#[derive(Clone, Debug, Default)]
pub struct InMemoryPersistence {
    exits: BTreeMap<u128, ExitBlob>,
    in_flight_exits: BTreeMap<H256, InFlightExitBlob>,
    competitors: BTreeMap<H256, CompetitorBlob>,
}

impl InMemoryPersistence {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of standard exits currently stored.
    pub fn exit_count(&self) -> usize {
        self.exits.len()
    }
}

impl Persistence for InMemoryPersistence {
    fn apply(&mut self, updates: &[DbUpdate]) -> DbResult<()> {
        for update in updates {
            match update {
                DbUpdate::PutExit { position, exit } => {
                    self.exits.insert(*position, exit.clone());
                }
                DbUpdate::DeleteExit { position } => {
                    self.exits.remove(position);
                }
                DbUpdate::PutInFlightExit { tx_hash, exit } => {
                    self.in_flight_exits.insert(*tx_hash, exit.clone());
                }
                DbUpdate::PutCompetitor {
                    tx_hash,
                    competitor,
                } => {
                    self.competitors.insert(*tx_hash, competitor.clone());
                }
            }
        }
        Ok(())
    }

    fn load_state(&self) -> DbResult<PersistedState> {
        Ok(PersistedState {
            exits: self.exits.iter().map(|(k, v)| (*k, v.clone())).collect(),
            in_flight_exits: self
                .in_flight_exits
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            competitors: self
                .competitors
                .iter()
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
        })
    }
}
