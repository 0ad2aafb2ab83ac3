//! Destination-chain integration module for the Solana oracle program
//!
//! This module provides the `DestinationLedgerClient` seam the oracle posts roots through,
//! the JSON-RPC implementation of it, and the account layouts shared with the program.

/// PDA seeds, account layouts and instruction encoding
pub mod accounts;
/// JSON-RPC client with transaction signing
mod client;
/// Root records, oracle state and errors
mod types;

pub use client::SolanaOracleClient;
pub use types::{OracleState, PostOutcome, RootRecord, SolanaError};

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

/// Write and read access to the oracle program on the destination chain.
#[async_trait]
pub trait DestinationLedgerClient: Send + Sync {
	/// Identity that signs every oracle transaction.
	fn authority(&self) -> Pubkey;

	/// Create the oracle-state record.
	///
	/// # Errors
	/// `SolanaError::AlreadyInitialized` if the record already exists.
	async fn initialize_oracle_state(&self) -> Result<Signature, SolanaError>;

	/// Submit a root record unless one already exists for its height.
	///
	/// Returns `PostOutcome::AlreadyPosted` without submitting when the height is taken,
	/// which also covers a previous attempt that landed but was never confirmed locally.
	async fn post_root(&self, record: &RootRecord) -> Result<PostOutcome, SolanaError>;

	async fn get_root(&self, block_height: u64) -> Result<Option<RootRecord>, SolanaError>;

	async fn get_oracle_state(&self) -> Result<Option<OracleState>, SolanaError>;
}
