//!
//! Solana JSON-RPC client for the oracle program.
//!
//! Reads account state with `getAccountInfo` and submits signed transactions with
//! `sendTransaction`, then polls `getSignatureStatuses` under an exponential backoff until
//! the transaction is confirmed or the confirmation window elapses. Root submissions check
//! for an existing record first, so a retry after an unconfirmed send never writes twice.

use super::DestinationLedgerClient;
use super::accounts::{
	initialize_instruction, oracle_state_address, post_root_instruction, root_record_address,
};
use super::types::*;
use async_trait::async_trait;
use backoff::{ExponentialBackoff, future::retry};
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer, read_keypair_file};
use solana_sdk::transaction::Transaction;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Client for the oracle program on a Solana cluster.
pub struct SolanaOracleClient {
	http_client: Client,
	rpc_url: String,
	program_id: Pubkey,
	/// Signs and pays for every oracle transaction.
	authority: Keypair,
	/// Upper bound on waiting for a submitted transaction to confirm.
	confirm_timeout: Duration,
}

impl SolanaOracleClient {
	/// Create a new oracle client.
	///
	/// # Arguments
	/// * `rpc_url` - Solana JSON-RPC endpoint.
	/// * `program_id` - Address of the deployed oracle program.
	/// * `authority` - Oracle authority keypair.
	/// * `timeout` - Ceiling applied to each RPC call.
	/// * `confirm_timeout` - How long to poll for confirmation after a send.
	pub fn new(
		rpc_url: String,
		program_id: Pubkey,
		authority: Keypair,
		timeout: Duration,
		confirm_timeout: Duration,
	) -> Result<Self, SolanaError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			rpc_url,
			program_id,
			authority,
			confirm_timeout,
		})
	}

	/// Load a Solana CLI keypair file (JSON array of 64 bytes).
	pub fn load_keypair(path: &Path) -> Result<Keypair, SolanaError> {
		read_keypair_file(path).map_err(|e| {
			SolanaError::KeypairError(format!("Failed to read {}: {}", path.display(), e))
		})
	}

	pub fn parse_program_id(program_id: &str) -> Result<Pubkey, SolanaError> {
		Pubkey::from_str(program_id).map_err(|e| {
			SolanaError::ConfigError(format!("Invalid program id {program_id:?}: {e}"))
		})
	}

	pub fn program_id(&self) -> &Pubkey {
		&self.program_id
	}

	async fn rpc_call<T: DeserializeOwned>(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<T, SolanaError> {
		let request = json!({
			"jsonrpc": "2.0",
			"id": 1,
			"method": method,
			"params": params,
		});

		let response = self
			.http_client
			.post(&self.rpc_url)
			.header("Content-Type", "application/json")
			.json(&request)
			.send()
			.await?
			.error_for_status()?;

		let envelope: RpcEnvelope<T> = response.json().await?;
		envelope.into_result(method)
	}

	/// Raw data of a program-owned account, or `None` if it does not exist.
	async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, SolanaError> {
		let response: RpcContextual<Option<AccountInfoValue>> = self
			.rpc_call(
				"getAccountInfo",
				json!([address.to_string(), { "encoding": "base64", "commitment": "confirmed" }]),
			)
			.await?;

		let Some(account) = response.value else {
			return Ok(None);
		};

		if account.owner != self.program_id.to_string() {
			return Err(SolanaError::ProtocolError(format!(
				"Account {} is owned by {}, not the oracle program",
				address, account.owner
			)));
		}

		let (payload, encoding) = account.data;
		if encoding != "base64" {
			return Err(SolanaError::ProtocolError(format!(
				"Unexpected account encoding {encoding}"
			)));
		}

		let bytes = STANDARD.decode(payload).map_err(|e| {
			SolanaError::ProtocolError(format!("Invalid base64 account data: {e}"))
		})?;
		Ok(Some(bytes))
	}

	async fn latest_blockhash(&self) -> Result<Hash, SolanaError> {
		let response: RpcContextual<LatestBlockhashValue> = self
			.rpc_call("getLatestBlockhash", json!([{ "commitment": "confirmed" }]))
			.await?;

		Hash::from_str(&response.value.blockhash)
			.map_err(|e| SolanaError::ProtocolError(format!("Invalid blockhash: {e}")))
	}

	/// Sign, send and confirm a single-instruction transaction.
	async fn submit(&self, instruction: Instruction) -> Result<Signature, SolanaError> {
		let blockhash = self.latest_blockhash().await?;
		let authority = self.authority.pubkey();
		let transaction = Transaction::new_signed_with_payer(
			&[instruction],
			Some(&authority),
			&[&self.authority],
			blockhash,
		);
		let signature = transaction.signatures[0];

		let wire = bincode::serialize(&transaction)
			.map_err(|e| SolanaError::TransactionError(format!("Failed to serialize: {e}")))?;

		let _: String = self
			.rpc_call(
				"sendTransaction",
				json!([
					STANDARD.encode(wire),
					{ "encoding": "base64", "preflightCommitment": "confirmed" }
				]),
			)
			.await?;
		debug!("Sent transaction {}", signature);

		self.confirm(&signature).await?;
		Ok(signature)
	}

	/// Poll the signature status until it reaches `confirmed` or `finalized`.
	async fn confirm(&self, signature: &Signature) -> Result<(), SolanaError> {
		let policy = ExponentialBackoff {
			initial_interval: Duration::from_millis(500),
			max_interval: Duration::from_secs(5),
			max_elapsed_time: Some(self.confirm_timeout),
			..ExponentialBackoff::default()
		};

		retry(policy, || async move {
			let response: RpcContextual<Vec<Option<SignatureStatusValue>>> = self
				.rpc_call(
					"getSignatureStatuses",
					json!([[signature.to_string()], { "searchTransactionHistory": false }]),
				)
				.await
				.map_err(backoff::Error::transient)?;

			match response.value.into_iter().next().flatten() {
				Some(status) if status.err.is_some() => Err(backoff::Error::permanent(
					SolanaError::TransactionError(format!(
						"Transaction {} failed: {}",
						signature,
						status.err.unwrap_or_default()
					)),
				)),
				Some(status)
					if matches!(
						status.confirmation_status.as_deref(),
						Some("confirmed") | Some("finalized")
					) =>
				{
					Ok(())
				}
				_ => Err(backoff::Error::transient(SolanaError::ConfirmationTimeout(
					signature.to_string(),
				))),
			}
		})
		.await
	}
}

#[async_trait]
impl DestinationLedgerClient for SolanaOracleClient {
	fn authority(&self) -> Pubkey {
		self.authority.pubkey()
	}

	async fn initialize_oracle_state(&self) -> Result<Signature, SolanaError> {
		let (oracle_state, _) = oracle_state_address(&self.program_id);

		if self.account_data(&oracle_state).await?.is_some() {
			return Err(SolanaError::AlreadyInitialized);
		}

		let signature = self
			.submit(initialize_instruction(
				&self.program_id,
				&self.authority.pubkey(),
			))
			.await?;

		info!("Oracle initialized. State PDA: {}", oracle_state);
		Ok(signature)
	}

	async fn post_root(&self, record: &RootRecord) -> Result<PostOutcome, SolanaError> {
		let (root_address, _) = root_record_address(&self.program_id, record.block_height);

		if self.account_data(&root_address).await?.is_some() {
			warn!(
				"Merkle root for block {} already posted",
				record.block_height
			);
			return Ok(PostOutcome::AlreadyPosted);
		}

		let signature = self
			.submit(post_root_instruction(
				&self.program_id,
				&self.authority.pubkey(),
				record,
			))
			.await?;

		info!(
			"Posted Merkle root for block {}: root {} tx {}",
			record.block_height,
			hex::encode(record.root_hash),
			signature
		);
		Ok(PostOutcome::Posted { signature })
	}

	async fn get_root(&self, block_height: u64) -> Result<Option<RootRecord>, SolanaError> {
		let (root_address, _) = root_record_address(&self.program_id, block_height);

		self.account_data(&root_address)
			.await?
			.map(|data| RootRecord::decode_account(&data))
			.transpose()
	}

	async fn get_oracle_state(&self) -> Result<Option<OracleState>, SolanaError> {
		let (oracle_state, _) = oracle_state_address(&self.program_id);

		self.account_data(&oracle_state)
			.await?
			.map(|data| OracleState::decode_account(&data))
			.transpose()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::solana::accounts::DISCRIMINATOR_LEN;
	use std::io::Write;
	use wiremock::matchers::{body_partial_json, method};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn record() -> RootRecord {
		RootRecord {
			block_height: 1_948_001,
			root_hash: [0x5a; 32],
			timestamp: 1_700_000_000,
			output_count: 3,
		}
	}

	fn new_client(mock_server: &MockServer, program_id: Pubkey) -> SolanaOracleClient {
		SolanaOracleClient::new(
			mock_server.uri(),
			program_id,
			Keypair::new(),
			Duration::from_secs(2),
			Duration::from_secs(2),
		)
		.unwrap()
	}

	fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
		ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
	}

	fn account_response(data: &[u8], owner: &Pubkey) -> ResponseTemplate {
		rpc_result(json!({
			"context": { "slot": 1 },
			"value": {
				"data": [STANDARD.encode(data), "base64"],
				"owner": owner.to_string(),
				"lamports": 1_000_000,
				"executable": false,
				"rentEpoch": 0
			}
		}))
	}

	async fn mount_rpc(mock_server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
		Mock::given(method("POST"))
			.and(body_partial_json(json!({ "method": rpc_method })))
			.respond_with(response)
			.mount(mock_server)
			.await;
	}

	/// Mounts everything `submit` needs up to and including `sendTransaction`.
	async fn mount_send_path(mock_server: &MockServer) {
		mount_rpc(
			mock_server,
			"getAccountInfo",
			rpc_result(json!({ "context": { "slot": 1 }, "value": null })),
		)
		.await;
		mount_rpc(
			mock_server,
			"getLatestBlockhash",
			rpc_result(json!({
				"context": { "slot": 1 },
				"value": { "blockhash": Hash::default().to_string(), "lastValidBlockHeight": 100 }
			})),
		)
		.await;
		Mock::given(method("POST"))
			.and(body_partial_json(json!({ "method": "sendTransaction" })))
			.respond_with(rpc_result(json!(Signature::default().to_string())))
			.expect(1)
			.mount(mock_server)
			.await;
	}

	#[tokio::test]
	async fn post_root_skips_send_when_record_exists() {
		let mock_server = MockServer::start().await;
		let program_id = Pubkey::new_unique();

		let mut data = vec![0u8; DISCRIMINATOR_LEN];
		data.extend_from_slice(&record().encode_payload());
		Mock::given(method("POST"))
			.and(body_partial_json(json!({ "method": "getAccountInfo" })))
			.respond_with(account_response(&data, &program_id))
			.expect(1)
			.mount(&mock_server)
			.await;
		Mock::given(method("POST"))
			.and(body_partial_json(json!({ "method": "sendTransaction" })))
			.respond_with(rpc_result(json!("unused")))
			.expect(0)
			.mount(&mock_server)
			.await;

		let client = new_client(&mock_server, program_id);
		let outcome = client.post_root(&record()).await.unwrap();

		assert_eq!(outcome, PostOutcome::AlreadyPosted);
		mock_server.verify().await;
	}

	#[tokio::test]
	async fn get_root_decodes_program_owned_account() {
		let mock_server = MockServer::start().await;
		let program_id = Pubkey::new_unique();

		let mut data = vec![7u8; DISCRIMINATOR_LEN];
		data.extend_from_slice(&record().encode_payload());
		mount_rpc(
			&mock_server,
			"getAccountInfo",
			account_response(&data, &program_id),
		)
		.await;

		let client = new_client(&mock_server, program_id);
		assert_eq!(client.get_root(1_948_001).await.unwrap(), Some(record()));
	}

	#[tokio::test]
	async fn account_owned_by_another_program_is_rejected() {
		let mock_server = MockServer::start().await;
		let program_id = Pubkey::new_unique();

		mount_rpc(
			&mock_server,
			"getAccountInfo",
			account_response(&[0u8; 60], &Pubkey::new_unique()),
		)
		.await;

		let client = new_client(&mock_server, program_id);
		assert!(matches!(
			client.post_root(&record()).await,
			Err(SolanaError::ProtocolError(_))
		));
	}

	#[tokio::test]
	async fn failed_transaction_status_is_a_transaction_error() {
		let mock_server = MockServer::start().await;
		mount_send_path(&mock_server).await;
		mount_rpc(
			&mock_server,
			"getSignatureStatuses",
			rpc_result(json!({
				"context": { "slot": 2 },
				"value": [{
					"slot": 2,
					"confirmations": 0,
					"err": { "InstructionError": [0, { "Custom": 6 }] },
					"confirmationStatus": "confirmed"
				}]
			})),
		)
		.await;

		let client = new_client(&mock_server, Pubkey::new_unique());
		let result = client.post_root(&record()).await;

		assert!(matches!(result, Err(SolanaError::TransactionError(_))));
		mock_server.verify().await;
	}

	#[tokio::test]
	async fn confirmed_transaction_reports_its_signature() {
		let mock_server = MockServer::start().await;
		mount_send_path(&mock_server).await;
		mount_rpc(
			&mock_server,
			"getSignatureStatuses",
			rpc_result(json!({
				"context": { "slot": 2 },
				"value": [{ "slot": 2, "confirmations": null, "err": null, "confirmationStatus": "finalized" }]
			})),
		)
		.await;

		let client = new_client(&mock_server, Pubkey::new_unique());
		let outcome = client.post_root(&record()).await.unwrap();

		assert!(matches!(outcome, PostOutcome::Posted { signature } if signature != Signature::default()));
		mock_server.verify().await;
	}

	#[tokio::test]
	async fn rpc_error_object_is_surfaced() {
		let mock_server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"jsonrpc": "2.0",
				"id": 1,
				"error": { "code": -32602, "message": "Invalid param" }
			})))
			.mount(&mock_server)
			.await;

		let client = new_client(&mock_server, Pubkey::new_unique());
		assert!(matches!(
			client.get_oracle_state().await,
			Err(SolanaError::RpcError { code: -32602, .. })
		));
	}

	#[test]
	fn keypair_file_round_trips() {
		let keypair = Keypair::new();
		let mut file = tempfile::NamedTempFile::new().unwrap();
		let bytes: Vec<u8> = keypair.to_bytes().to_vec();
		write!(file, "{}", serde_json::to_string(&bytes).unwrap()).unwrap();

		let loaded = SolanaOracleClient::load_keypair(file.path()).unwrap();
		assert_eq!(loaded.pubkey(), keypair.pubkey());
	}

	#[test]
	fn missing_keypair_file_is_a_keypair_error() {
		let err = SolanaOracleClient::load_keypair(Path::new("/nonexistent/oracle.json"))
			.unwrap_err();
		assert!(matches!(err, SolanaError::KeypairError(_)));
	}

	#[test]
	fn program_id_must_be_base58_pubkey() {
		assert!(matches!(
			SolanaOracleClient::parse_program_id("not a key"),
			Err(SolanaError::ConfigError(_))
		));

		let id = Pubkey::new_unique();
		assert_eq!(
			SolanaOracleClient::parse_program_id(&id.to_string()).unwrap(),
			id
		);
	}

	#[test]
	fn authority_is_the_keypair_pubkey() {
		let keypair = Keypair::new();
		let expected = keypair.pubkey();
		let client = SolanaOracleClient::new(
			"http://127.0.0.1:8899".into(),
			Pubkey::new_unique(),
			keypair,
			Duration::from_secs(1),
			Duration::from_secs(1),
		)
		.unwrap();

		assert_eq!(client.authority(), expected);
	}
}
