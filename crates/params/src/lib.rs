//! Parameters for the watcher.
//!
//! These are the operational knobs a deployment tunes per network. They are kept in their
//! own crate so that drivers, RPC surfaces and the exit processor core agree on a single
//! definition.

pub mod types;

pub use types::WatcherParams;
