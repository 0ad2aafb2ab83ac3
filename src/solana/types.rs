//! Types for the destination-chain oracle program

use crate::merkle::Hash32;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

/// A block's committed root as stored on the destination chain. Write-once per height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootRecord {
	pub block_height: u64,
	pub root_hash: Hash32,
	/// Unix seconds of the source block.
	pub timestamp: i64,
	pub output_count: u32,
}

/// The persisted oracle progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleState {
	pub authority: Pubkey,
	pub last_updated_block: u64,
	pub total_roots_posted: u64,
}

/// Result of an idempotent root submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
	/// A new record was written by the transaction with this signature.
	Posted { signature: Signature },
	/// A record for the height already existed; nothing was submitted.
	AlreadyPosted,
}

/// JSON-RPC 2.0 response envelope used by the Solana RPC.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcEnvelope<T> {
	pub result: Option<T>,
	pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorObject {
	pub code: i64,
	pub message: String,
}

impl<T> RpcEnvelope<T> {
	pub fn into_result(self, method: &str) -> Result<T, SolanaError> {
		if let Some(error) = self.error {
			return Err(SolanaError::RpcError {
				code: error.code,
				message: error.message,
			});
		}

		self.result.ok_or_else(|| {
			SolanaError::ProtocolError(format!("{method} response has neither result nor error"))
		})
	}
}

/// `{ context, value }` wrapper returned by most Solana RPC methods.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcContextual<T> {
	pub value: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountInfoValue {
	/// `[payload, encoding]`
	pub data: (String, String),
	pub owner: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LatestBlockhashValue {
	pub blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignatureStatusValue {
	#[serde(default)]
	pub confirmation_status: Option<String>,
	#[serde(default)]
	pub err: Option<serde_json::Value>,
}

/// Error types for destination-chain operations
#[derive(Debug, thiserror::Error)]
pub enum SolanaError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("RPC error {code}: {message}")]
	RpcError { code: i64, message: String },

	#[error("Malformed RPC response: {0}")]
	ProtocolError(String),

	#[error("Oracle already initialized")]
	AlreadyInitialized,

	#[error("Keypair error: {0}")]
	KeypairError(String),

	#[error("Invalid configuration: {0}")]
	ConfigError(String),

	#[error("Transaction error: {0}")]
	TransactionError(String),

	#[error("Transaction {0} not confirmed in time")]
	ConfirmationTimeout(String),
}
