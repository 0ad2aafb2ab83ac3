//! Process configuration.
//!
//! Every setting is a command-line flag with an environment-variable fallback, so the
//! service runs unchanged from a shell, a `.env`-driven launcher or a container.

use crate::monero::MoneroRpcClient;
use crate::oracle::{EngineConfig, OracleError};
use crate::solana::SolanaOracleClient;
use clap::Parser;
use solana_sdk::pubkey::Pubkey;
use std::path::PathBuf;
use std::time::Duration;

/// Connection and timing settings shared by every subcommand.
#[derive(Debug, Clone, Parser)]
pub struct OracleConfig {
	/// Monero daemon RPC base URL.
	#[arg(
		long = "monero-rpc-url",
		env = "MONERO_RPC_URL",
		default_value = "https://stagenet.xmr.ditatompel.com",
		global = true
	)]
	pub monero_rpc_url: String,

	/// Solana JSON-RPC URL.
	#[arg(
		long = "solana-rpc-url",
		env = "SOLANA_RPC_URL",
		default_value = "https://api.devnet.solana.com",
		global = true
	)]
	pub solana_rpc_url: String,

	/// Oracle authority keypair (Solana CLI JSON format).
	#[arg(
		long = "keypair",
		env = "ORACLE_KEYPAIR_PATH",
		default_value = "../keypair/oracle.json",
		global = true
	)]
	pub keypair_path: PathBuf,

	/// Address of the deployed oracle program.
	#[arg(long = "program-id", env = "ORACLE_PROGRAM_ID", global = true)]
	pub program_id: Option<String>,

	/// Sleep between passes once caught up, in milliseconds.
	#[arg(
		long = "poll-interval-ms",
		env = "POLL_INTERVAL_MS",
		default_value_t = 60_000,
		global = true
	)]
	pub poll_interval_ms: u64,

	/// Sleep after a failed pass, in milliseconds. Must be shorter than the poll interval.
	#[arg(
		long = "retry-backoff-ms",
		env = "RETRY_BACKOFF_MS",
		default_value_t = 10_000,
		global = true
	)]
	pub retry_backoff_ms: u64,

	/// Heights at or below this are never posted.
	#[arg(
		long = "start-block",
		env = "START_BLOCK_HEIGHT",
		default_value_t = 0,
		global = true
	)]
	pub start_block_height: u64,

	/// Per-call ceiling for both RPC clients, in seconds.
	#[arg(
		long = "rpc-timeout-secs",
		env = "RPC_TIMEOUT_SECS",
		default_value_t = 30,
		global = true
	)]
	pub rpc_timeout_secs: u64,

	/// How long to wait for a submitted transaction to confirm, in seconds.
	#[arg(
		long = "confirm-timeout-secs",
		env = "CONFIRM_TIMEOUT_SECS",
		default_value_t = 60,
		global = true
	)]
	pub confirm_timeout_secs: u64,

	/// Escalate to error-level logging after this many failed passes in a row.
	#[arg(
		long = "failure-alert-after",
		env = "FAILURE_ALERT_AFTER",
		default_value_t = 5,
		global = true
	)]
	pub failure_alert_threshold: u32,
}

impl OracleConfig {
	/// Reject settings the engine cannot run with.
	pub fn validate(&self) -> Result<(), OracleError> {
		if self.poll_interval_ms == 0 {
			return Err(OracleError::ConfigError(
				"poll interval must be greater than zero".into(),
			));
		}

		if self.retry_backoff_ms >= self.poll_interval_ms {
			return Err(OracleError::ConfigError(format!(
				"retry backoff ({} ms) must be shorter than the poll interval ({} ms)",
				self.retry_backoff_ms, self.poll_interval_ms
			)));
		}

		if self.failure_alert_threshold == 0 {
			return Err(OracleError::ConfigError(
				"failure alert threshold must be greater than zero".into(),
			));
		}

		if self.rpc_timeout_secs == 0 {
			return Err(OracleError::ConfigError(
				"RPC timeout must be greater than zero".into(),
			));
		}

		if matches!(self.program_id.as_deref(), Some(id) if id.trim().is_empty()) {
			return Err(OracleError::ConfigError("ORACLE_PROGRAM_ID is empty".into()));
		}

		Ok(())
	}

	pub fn engine_config(&self) -> EngineConfig {
		EngineConfig {
			start_height: self.start_block_height,
			poll_interval: Duration::from_millis(self.poll_interval_ms),
			retry_backoff: Duration::from_millis(self.retry_backoff_ms),
		}
	}

	pub fn rpc_timeout(&self) -> Duration {
		Duration::from_secs(self.rpc_timeout_secs)
	}

	pub fn confirm_timeout(&self) -> Duration {
		Duration::from_secs(self.confirm_timeout_secs)
	}

	/// The oracle program address; required by every destination-chain command.
	pub fn program_id(&self) -> Result<Pubkey, OracleError> {
		let program_id = self
			.program_id
			.as_deref()
			.map(str::trim)
			.filter(|id| !id.is_empty())
			.ok_or_else(|| OracleError::ConfigError("ORACLE_PROGRAM_ID is not set".into()))?;

		SolanaOracleClient::parse_program_id(program_id)
			.map_err(|e| OracleError::ConfigError(e.to_string()))
	}

	pub fn source_client(&self) -> Result<MoneroRpcClient, OracleError> {
		Ok(MoneroRpcClient::new(
			self.monero_rpc_url.clone(),
			self.rpc_timeout(),
		)?)
	}

	/// Load the authority keypair and build the destination client.
	pub fn destination_client(&self) -> Result<SolanaOracleClient, OracleError> {
		let program_id = self.program_id()?;
		let authority = SolanaOracleClient::load_keypair(&self.keypair_path)
			.map_err(|e| OracleError::ConfigError(e.to_string()))?;

		Ok(SolanaOracleClient::new(
			self.solana_rpc_url.clone(),
			program_id,
			authority,
			self.rpc_timeout(),
			self.confirm_timeout(),
		)?)
	}
}
