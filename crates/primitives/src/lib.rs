//! This crate contains the primitive types shared across the watcher workspace: the packed
//! UTXO position, the consensus constants tied to it, and the child-block Merkle tree used
//! to assemble inclusion proofs.
//!
//! It lies at the bottom of the crate hierarchy in this workspace i.e., it does not depend
//! on any other crate in this workspace.

pub mod constants;
pub mod errors;
pub mod merkle;
pub mod position;

pub use ethereum_types::{Address, H256, U256};
