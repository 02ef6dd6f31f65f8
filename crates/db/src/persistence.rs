//! The storage capability held by the driver.

use ethereum_types::H256;

use crate::{
    errors::DbResult,
    updates::{CompetitorBlob, DbUpdate, ExitBlob, InFlightExitBlob},
};

/// Everything the store holds, streamed back at startup to rebuild the core.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistedState {
    /// Standard exits by packed position key.
    pub exits: Vec<(u128, ExitBlob)>,

    /// In-flight exits by raw transaction hash.
    pub in_flight_exits: Vec<(H256, InFlightExitBlob)>,

    /// Competitors by their raw transaction hash.
    pub competitors: Vec<(H256, CompetitorBlob)>,
}

/// Batch-write capability over the watcher's key-value store.
///
/// The core never selects or holds a backend; the driver owns one implementation of this
/// trait and applies each returned batch before acknowledging the ingest.
pub trait Persistence {
    /// Applies a batch of deltas atomically.
    fn apply(&mut self, updates: &[DbUpdate]) -> DbResult<()>;

    /// Streams the full stored state back so the core can be rebuilt at startup.
    fn load_state(&self) -> DbResult<PersistedState>;
}
