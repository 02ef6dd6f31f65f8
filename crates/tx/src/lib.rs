//! The child-chain transaction model.
//!
//! This crate owns the canonical transaction encoding the root contract commits to, the
//! typed-data hash fed to signature recovery, and the recovery of spender addresses from
//! per-input signatures. Everything here is bit-exact with the contract: a watcher that
//! hashes differently produces challenge evidence the contract rejects.

pub mod errors;
pub mod recover;
pub mod signed;
pub mod transaction;
pub mod typed_data;

pub use errors::TxError;
pub use signed::{Signature, Signed};
pub use transaction::{Transaction, TxOutput};
