//! Persistence deltas and the storage capability.
//!
//! The exit processor core never talks to a database. Every ingest operation returns a
//! batch of [`DbUpdate`] deltas; the driver applies them atomically through whichever
//! [`Persistence`] implementation it holds and streams the stored state back at startup.

pub mod errors;
pub mod inmemory;
pub mod persistence;
pub mod updates;

pub use errors::{DbError, DbResult};
pub use inmemory::InMemoryPersistence;
pub use persistence::{PersistedState, Persistence};
pub use updates::{CompetitorBlob, DbUpdate, ExitBlob, InFlightExitBlob};
