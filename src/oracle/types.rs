//! Types for the oracle sync engine

use crate::merkle::{Hash32, MerkleError};
use crate::monero::MoneroError;
use crate::solana::SolanaError;
use solana_sdk::signature::Signature;
use std::time::Duration;

/// Lifecycle of an [`OracleSyncEngine`](super::OracleSyncEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
	Uninitialized,
	Initializing,
	Ready,
	/// Fetching blocks and posting roots.
	Syncing,
	/// Sleeping for the poll interval or the retry backoff.
	Waiting,
	Stopped,
	/// Halted on a configuration error; the engine will not resume on its own.
	Faulted,
}

/// Engine timing and start position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
	/// Lowest cursor value; heights at or below it are never processed.
	pub start_height: u64,
	/// Sleep between passes once the cursor has reached the chain tip.
	pub poll_interval: Duration,
	/// Sleep after a failed pass before retrying.
	pub retry_backoff: Duration,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			start_height: 0,
			poll_interval: Duration::from_millis(60_000),
			retry_backoff: Duration::from_millis(10_000),
		}
	}
}

/// Result of [`OracleSyncEngine::initialize`](super::OracleSyncEngine::initialize).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeOutcome {
	Initialized { signature: Signature },
	/// The oracle-state record already existed. Informational.
	AlreadyInitialized,
}

/// What processing a single height did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
	Posted {
		root: Hash32,
		output_count: u32,
		signature: Signature,
	},
	/// A root for the height was already on the destination chain.
	AlreadyPosted { root: Hash32, output_count: u32 },
	/// The block has no outputs; nothing was posted and the cursor did not move.
	Empty,
}

/// Error types for the oracle sync engine
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
	#[error("Source chain error: {0}")]
	SourceError(#[from] MoneroError),

	#[error("Destination chain error: {0}")]
	DestinationError(#[from] SolanaError),

	#[error("Merkle error: {0}")]
	MerkleError(#[from] MerkleError),

	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Source chain RPC is unreachable")]
	SourceUnreachable,

	#[error("Oracle state not initialized; run the init command first")]
	NotInitialized,

	#[error("Configuration error: {0}")]
	ConfigError(String),
}

impl OracleError {
	/// Errors that retrying cannot fix. The sync loop halts on these instead of backing off.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			Self::SourceUnreachable
				| Self::NotInitialized
				| Self::ConfigError(_)
				| Self::DestinationError(SolanaError::KeypairError(_))
				| Self::DestinationError(SolanaError::ConfigError(_))
		)
	}
}
