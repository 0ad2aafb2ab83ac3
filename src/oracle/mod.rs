//! Oracle Synchronization Module
//!
//! This module contains the engine that commits source-chain blocks to the destination
//! chain, one Merkle root per height:
//!
//! - `engine`: the polling state machine that walks unprocessed heights, builds trees and posts roots.
//! - `events`: events emitted for every settled height and every pass, and the handler trait.
//! - `progress_tracker`: counters, gap detection and the shutdown summary.
//! - `types`: engine configuration, lifecycle states, outcomes and the `OracleError` taxonomy.
//!
//! The engine receives its source and destination clients as trait objects, so tests drive
//! it against in-memory chains.

/// Polling state machine
pub mod engine;
/// Event system for decoupled observation of sync progress
pub mod events;
/// Tracks synchronization progress and statistics
pub mod progress_tracker;
/// Engine configuration, states and errors
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::OracleSyncEngine;
pub use events::LoggingEventHandler;
pub use types::*;
