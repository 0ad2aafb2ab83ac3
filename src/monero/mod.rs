//! Source-chain integration module for the Monero daemon
//!
//! This module provides the `SourceLedgerClient` seam the oracle reads blocks through, the
//! HTTP JSON-RPC implementation of it, and the output/block types that feed leaf hashing.

/// JSON-RPC client for the Monero daemon
mod client;
/// Domain records, wire schemas and errors
mod types;

pub use client::MoneroRpcClient;
pub use types::{Block, EcdhInfo, MoneroError, MoneroTransaction, Output};

use async_trait::async_trait;

/// Read access to the source chain.
///
/// `outputs_for_block` must return outputs ordered by transaction position within the
/// block, then by output index within the transaction; leaf order depends on it.
#[async_trait]
pub trait SourceLedgerClient: Send + Sync {
	/// Height of the chain tip (block count minus one).
	async fn current_height(&self) -> Result<u64, MoneroError>;

	async fn block_metadata(&self, height: u64) -> Result<Block, MoneroError>;

	/// All outputs of the block's transactions. An empty block yields an empty vector.
	async fn outputs_for_block(&self, height: u64) -> Result<Vec<Output>, MoneroError>;

	async fn transaction(&self, tx_hash: &str) -> Result<MoneroTransaction, MoneroError>;

	/// A single output of a transaction.
	async fn output(&self, tx_hash: &str, output_index: u32) -> Result<Output, MoneroError> {
		let tx = self.transaction(tx_hash).await?;

		tx.outputs
			.into_iter()
			.find(|output| output.output_index == output_index)
			.ok_or_else(|| MoneroError::OutputIndexOutOfRange {
				tx_hash: tx_hash.to_string(),
				index: output_index,
			})
	}

	/// Liveness check; never fails.
	async fn is_reachable(&self) -> bool;
}
