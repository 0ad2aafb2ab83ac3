//!
//! HTTP JSON-RPC client for a Monero daemon.
//!
//! All calls go to `{rpc_url}/json_rpc` with a per-request timeout. Transaction details
//! for one block are fetched concurrently and re-assembled in block order, so the
//! resulting output sequence is identical across calls for the same height.

use super::SourceLedgerClient;
use super::types::*;
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Monero daemon JSON-RPC client
#[derive(Clone)]
pub struct MoneroRpcClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the daemon RPC server.
	rpc_url: String,
}

impl MoneroRpcClient {
	/// Create a new daemon client.
	///
	/// # Arguments
	/// * `rpc_url` - Base URL of the daemon, without the `/json_rpc` suffix.
	/// * `timeout` - Ceiling applied to every individual RPC call.
	pub fn new(rpc_url: String, timeout: Duration) -> Result<Self, MoneroError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			rpc_url,
		})
	}

	fn endpoint(&self) -> String {
		format!("{}/json_rpc", self.rpc_url.trim_end_matches('/'))
	}

	/// Execute a JSON-RPC call and decode its `result` into `T`.
	///
	/// # Errors
	/// `HttpError` on transport failure or non-success status, `RpcError` when the daemon
	/// returns an error object, and `ProtocolError`/`JsonError` on malformed payloads.
	async fn rpc_call<P, T>(&self, method: &str, params: P) -> Result<T, MoneroError>
	where
		P: Serialize + Send,
		T: DeserializeOwned,
	{
		let request = RpcRequest {
			jsonrpc: "2.0",
			id: "0",
			method,
			params,
		};

		let response = self
			.http_client
			.post(self.endpoint())
			.header("Content-Type", "application/json")
			.json(&request)
			.send()
			.await?
			.error_for_status()?;

		let envelope: RpcEnvelope<T> = response.json().await?;
		envelope.into_result(method)
	}
}

#[async_trait]
impl SourceLedgerClient for MoneroRpcClient {
	async fn current_height(&self) -> Result<u64, MoneroError> {
		let result: BlockCountResult = self.rpc_call("get_block_count", json!({})).await?;

		result
			.count
			.checked_sub(1)
			.ok_or_else(|| MoneroError::ProtocolError("Daemon reported a block count of 0".into()))
	}

	async fn block_metadata(&self, height: u64) -> Result<Block, MoneroError> {
		let result: GetBlockResult = self
			.rpc_call("get_block", json!({ "height": height }))
			.await?;

		let block = result.into_block()?;
		if block.height != height {
			return Err(MoneroError::ProtocolError(format!(
				"Requested block {} but daemon returned {}",
				height, block.height
			)));
		}

		Ok(block)
	}

	async fn transaction(&self, tx_hash: &str) -> Result<MoneroTransaction, MoneroError> {
		let result: GetTransactionsResult = self
			.rpc_call(
				"get_transactions",
				json!({ "txs_hashes": [tx_hash], "decode_as_json": true }),
			)
			.await?;

		let entry = result
			.txs
			.into_iter()
			.next()
			.ok_or_else(|| MoneroError::TransactionNotFound(tx_hash.to_string()))?;

		entry.into_transaction(tx_hash)
	}

	async fn outputs_for_block(&self, height: u64) -> Result<Vec<Output>, MoneroError> {
		let block = self.block_metadata(height).await?;

		if block.tx_hashes.is_empty() {
			return Ok(Vec::new());
		}

		debug!(
			"Fetching {} transactions for block {}",
			block.tx_hashes.len(),
			height
		);

		// try_join_all keeps results in input order.
		let transactions =
			try_join_all(block.tx_hashes.iter().map(|hash| self.transaction(hash))).await?;

		Ok(transactions
			.into_iter()
			.flat_map(|tx| tx.outputs)
			.collect())
	}

	async fn is_reachable(&self) -> bool {
		match self.current_height().await {
			Ok(height) => {
				debug!("Monero daemon reachable at height {}", height);
				true
			}
			Err(e) => {
				warn!("Monero daemon at {} unreachable: {}", self.rpc_url, e);
				false
			}
		}
	}
}
