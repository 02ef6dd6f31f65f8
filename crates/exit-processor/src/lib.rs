//! The exit processor: the deterministic core of the watcher.
//!
//! A root contract publishes exit-related events; a child chain publishes blocks of
//! transactions. This crate ingests both (as values, never over I/O), maintains the set of
//! all in-progress exits, classifies the chain as healthy or byzantine, and assembles the
//! cryptographic evidence needed to challenge invalid exits on the root contract.
//!
//! The [`Core`] is a single-owner, non-suspending state machine. Every ingest operation
//! mutates the core and returns persistence deltas for the driver to apply; every analysis
//! function is a pure read. Ordering is defined entirely by the order in which the driver
//! feeds events, which it is expected to serialise by root-chain height.

pub mod canonicity;
pub mod collaborators;
pub mod competitor_info;
pub mod core;
pub mod errors;
pub mod events;
pub mod exit_info;
pub mod in_flight_info;
pub mod known_tx;
pub mod piggyback;
pub mod request;
pub mod rootchain;
pub mod standard_challenge;
pub mod tx_appendix;
pub mod validity;

#[cfg(test)]
mod testing;

pub use crate::core::Core;
pub use errors::{ChallengeError, CoreError};
pub use events::{ChainStatus, Event};
pub use request::Request;
pub use rootchain::ContractId;
