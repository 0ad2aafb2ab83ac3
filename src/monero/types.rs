//! Types for the Monero daemon JSON-RPC integration
//!
//! Domain records handed to the rest of the oracle (`Output`, `Block`, `MoneroTransaction`)
//! plus the typed wire schemas the daemon responses are decoded into. Envelope and header
//! fields are required; per-output fields fall back to the same empty or `"0"` values the
//! deployed oracle has always hashed, so roots stay stable for existing records.

use serde::{Deserialize, Serialize};

/// Encrypted amount data attached to a RingCT output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcdhInfo {
	pub amount: String,
	pub mask: String,
}

/// One transaction output on the source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
	/// Hash of the owning transaction.
	pub tx_hash: String,
	/// Position of the output within its transaction.
	pub output_index: u32,
	/// Cleartext amount; zero for RingCT outputs.
	pub amount: u64,
	/// One-time destination key from `vout[i].target`.
	pub stealth_address: String,
	/// Output commitment from `rct_signatures.outPk[i]`.
	pub one_time_address: String,
	pub ecdh_info: EcdhInfo,
	pub block_height: u64,
}

/// Block metadata needed by the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
	pub height: u64,
	pub hash: String,
	/// Unix seconds.
	pub timestamp: i64,
	/// Non-coinbase transaction hashes in block order.
	pub tx_hashes: Vec<String>,
}

/// A decoded transaction and its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoneroTransaction {
	pub hash: String,
	pub block_height: u64,
	pub timestamp: i64,
	pub outputs: Vec<Output>,
}

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a, P> {
	pub jsonrpc: &'static str,
	pub id: &'static str,
	pub method: &'a str,
	pub params: P,
}

/// JSON-RPC 2.0 response envelope.
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
	/// Resolve the envelope into its result, mapping RPC-level errors.
	pub fn into_result(self, method: &str) -> Result<T, MoneroError> {
		if let Some(error) = self.error {
			return Err(MoneroError::RpcError {
				code: error.code,
				message: error.message,
			});
		}

		self.result.ok_or_else(|| {
			MoneroError::ProtocolError(format!("{method} response has neither result nor error"))
		})
	}
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockCountResult {
	pub count: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetBlockResult {
	pub block_header: BlockHeader,
	/// The block body, itself a JSON document encoded as a string.
	pub json: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockHeader {
	pub height: u64,
	pub hash: String,
	pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockBodyJson {
	#[serde(default)]
	pub tx_hashes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetTransactionsResult {
	#[serde(default)]
	pub txs: Vec<TransactionEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionEntry {
	/// The decoded transaction, itself a JSON document encoded as a string.
	pub as_json: String,
	#[serde(default)]
	pub block_height: u64,
	#[serde(default)]
	pub block_timestamp: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionJson {
	pub vout: Vec<Vout>,
	#[serde(default)]
	pub rct_signatures: Option<RctSignatures>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Vout {
	#[serde(default)]
	pub amount: u64,
	#[serde(default)]
	pub target: VoutTarget,
}

/// Output target. Only the legacy `key` form is read; view-tagged outputs
/// (`tagged_key`) carry no `key` and commit an empty stealth address.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct VoutTarget {
	#[serde(default)]
	pub key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RctSignatures {
	#[serde(rename = "outPk", default)]
	pub out_pk: Vec<String>,
	#[serde(rename = "ecdhInfo", default)]
	pub ecdh_info: Vec<EcdhEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EcdhEntry {
	#[serde(default)]
	pub amount: Option<String>,
	#[serde(default)]
	pub mask: Option<String>,
}

impl GetBlockResult {
	pub fn into_block(self) -> Result<Block, MoneroError> {
		let body: BlockBodyJson = serde_json::from_str(&self.json).map_err(|e| {
			MoneroError::ProtocolError(format!(
				"Invalid block body JSON at height {}: {}",
				self.block_header.height, e
			))
		})?;

		Ok(Block {
			height: self.block_header.height,
			hash: self.block_header.hash,
			timestamp: self.block_header.timestamp,
			tx_hashes: body.tx_hashes,
		})
	}
}

impl TransactionEntry {
	/// Decode the embedded transaction JSON into domain outputs in `vout` order.
	pub fn into_transaction(self, tx_hash: &str) -> Result<MoneroTransaction, MoneroError> {
		let decoded: TransactionJson = serde_json::from_str(&self.as_json).map_err(|e| {
			MoneroError::ProtocolError(format!("Invalid transaction JSON for {tx_hash}: {e}"))
		})?;

		let rct = decoded.rct_signatures.unwrap_or_default();
		let mut outputs = Vec::with_capacity(decoded.vout.len());

		for (index, vout) in decoded.vout.into_iter().enumerate() {
			let stealth_address = vout.target.key.unwrap_or_default();
			let ecdh = rct.ecdh_info.get(index);
			let output_index = u32::try_from(index).map_err(|_| {
				MoneroError::ProtocolError(format!("Output index {index} of {tx_hash} overflows"))
			})?;

			outputs.push(Output {
				tx_hash: tx_hash.to_string(),
				output_index,
				amount: vout.amount,
				stealth_address,
				one_time_address: rct.out_pk.get(index).cloned().unwrap_or_default(),
				ecdh_info: EcdhInfo {
					amount: ecdh
						.and_then(|e| e.amount.clone())
						.unwrap_or_else(|| "0".to_string()),
					mask: ecdh
						.and_then(|e| e.mask.clone())
						.unwrap_or_else(|| "0".to_string()),
				},
				block_height: self.block_height,
			});
		}

		Ok(MoneroTransaction {
			hash: tx_hash.to_string(),
			block_height: self.block_height,
			timestamp: self.block_timestamp,
			outputs,
		})
	}
}

/// Error types for Monero daemon RPC operations
#[derive(Debug, thiserror::Error)]
pub enum MoneroError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("RPC error {code}: {message}")]
	RpcError { code: i64, message: String },

	#[error("Malformed RPC response: {0}")]
	ProtocolError(String),

	#[error("Transaction not found: {0}")]
	TransactionNotFound(String),

	#[error("Output index {index} out of range for tx {tx_hash}")]
	OutputIndexOutOfRange { tx_hash: String, index: u32 },
}
