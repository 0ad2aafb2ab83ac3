mod config;
mod merkle;
mod monero;
mod oracle;
mod solana;
mod utils;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::OracleConfig;
use crate::merkle::{MerkleTree, MerkleTreeBuilder};
use crate::monero::SourceLedgerClient;
use crate::oracle::{InitializeOutcome, LoggingEventHandler, OracleError, OracleSyncEngine};
use crate::solana::DestinationLedgerClient;
use crate::utils::{format_root_prefix, format_unix_timestamp};

/// Posts a Merkle root of every Monero block's outputs to the Solana oracle program.
#[derive(Debug, Parser)]
#[command(name = "monero-solana-oracle", version)]
struct Cli {
	#[command(flatten)]
	config: OracleConfig,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Run continuous sync until SIGINT or SIGTERM.
	Sync,
	/// Create the oracle state account (one time).
	Init,
	/// Show the root posted for a block.
	Root {
		#[arg(long)]
		block: u64,
	},
	/// Show the oracle state account.
	State,
	/// Rebuild a block's tree and print the inclusion proof for one output.
	Prove {
		#[arg(long)]
		block: u64,
		/// Transaction hash owning the output.
		#[arg(long)]
		tx: String,
		/// Output index within the transaction.
		#[arg(long, default_value_t = 0)]
		index: u32,
	},
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let cli = Cli::parse();

	if let Err(e) = run(cli).await {
		error!("{}", e);
		std::process::exit(1);
	}
}

async fn run(cli: Cli) -> Result<(), OracleError> {
	let config = cli.config;
	config.validate()?;

	match cli.command {
		Command::Sync => sync(&config).await,
		Command::Init => init(&config).await,
		Command::Root { block } => query_root(&config, block).await,
		Command::State => query_state(&config).await,
		Command::Prove { block, tx, index } => prove(&config, block, &tx, index).await,
	}
}

async fn sync(config: &OracleConfig) -> Result<(), OracleError> {
	info!("Starting Monero oracle");

	let source = config.source_client()?;
	let destination = config.destination_client()?;

	info!("Monero RPC: {}", config.monero_rpc_url);
	info!("Solana RPC: {}", config.solana_rpc_url);
	info!("Oracle program: {}", destination.program_id());
	info!("Oracle authority: {}", destination.authority());

	let mut engine = OracleSyncEngine::new(
		Box::new(source),
		Box::new(destination),
		config.engine_config(),
		CancellationToken::new(),
	);
	engine.register_handler(Box::new(LoggingEventHandler::new(
		config.failure_alert_threshold,
	)));

	let signals = tokio::spawn(shutdown_signal(engine.shutdown_token()));

	let result = engine.start().await;

	// Releases the signal task when the engine halted on its own.
	engine.stop();
	if let Err(e) = signals.await {
		warn!("Signal listener ended abnormally: {}", e);
	}

	info!(
		"Engine {:?} at block {}. {}",
		engine.state(),
		engine.cursor(),
		engine.progress().summary()
	);
	result
}

async fn init(config: &OracleConfig) -> Result<(), OracleError> {
	let mut engine = OracleSyncEngine::new(
		Box::new(config.source_client()?),
		Box::new(config.destination_client()?),
		config.engine_config(),
		CancellationToken::new(),
	);

	match engine.initialize().await? {
		InitializeOutcome::Initialized { signature } => {
			println!("Oracle initialized. Transaction: {signature}");
		}
		InitializeOutcome::AlreadyInitialized => {
			println!("Oracle already initialized");
		}
	}

	Ok(())
}

async fn query_root(config: &OracleConfig, block: u64) -> Result<(), OracleError> {
	let destination = config.destination_client()?;

	match destination.get_root(block).await? {
		Some(record) => {
			println!("Block height: {}", record.block_height);
			println!("Merkle root:  {}", hex::encode(record.root_hash));
			println!("Timestamp:    {}", format_unix_timestamp(record.timestamp));
			println!("Outputs:      {}", record.output_count);
		}
		None => println!("No Merkle root posted for block {block}"),
	}

	Ok(())
}

async fn query_state(config: &OracleConfig) -> Result<(), OracleError> {
	let destination = config.destination_client()?;

	match destination.get_oracle_state().await? {
		Some(state) => {
			println!("Authority:         {}", state.authority);
			println!("Last updated block: {}", state.last_updated_block);
			println!("Total roots posted: {}", state.total_roots_posted);
		}
		None => println!("Oracle not initialized"),
	}

	Ok(())
}

async fn prove(
	config: &OracleConfig,
	block: u64,
	tx_hash: &str,
	output_index: u32,
) -> Result<(), OracleError> {
	let source = config.source_client()?;

	let output = source.output(tx_hash, output_index).await?;
	if output.block_height != block {
		warn!(
			"Transaction {} is in block {}, not {}",
			tx_hash, output.block_height, block
		);
	}

	let outputs = source.outputs_for_block(block).await?;
	let proof = MerkleTreeBuilder::new().proof_for_output(&outputs, tx_hash, output_index)?;

	println!("{}", serde_json::to_string_pretty(&proof)?);
	println!(
		"Proof verifies against root {}: {}",
		format_root_prefix(&proof.root),
		MerkleTree::verify(&proof)
	);

	if config.program_id.is_none() {
		return Ok(());
	}

	let destination = config.destination_client()?;
	match destination.get_root(block).await? {
		Some(record) if record.root_hash == proof.root => {
			println!("Matches the root posted for block {block}");
		}
		Some(record) => {
			println!(
				"Does NOT match the root posted for block {}: {}",
				block,
				hex::encode(record.root_hash)
			);
		}
		None => println!("No Merkle root posted for block {block}"),
	}

	Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM. Returns early if it is cancelled elsewhere.
async fn shutdown_signal(shutdown: CancellationToken) {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			warn!("Failed to listen for Ctrl-C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				warn!("Failed to listen for SIGTERM: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = shutdown.cancelled() => return,
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	info!("Shutdown requested, stopping at the next pass boundary");
	shutdown.cancel();
}
