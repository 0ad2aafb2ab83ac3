//!
//! Oracle sync engine.
//!
//! The engine owns the three collaborators (source client, tree builder, destination
//! client) and drives them one height at a time. Each pass reads the source tip, walks every
//! height above the cursor in ascending order, and posts one root per non-empty block. The
//! cursor moves only after a root is confirmed on the destination chain or found already
//! there. Failed passes are retried after a short backoff; only configuration errors stop
//! the loop. Shutdown is cooperative through a `CancellationToken` checked at the top of
//! every pass.

use super::events::{EventDispatcher, SyncEvent, SyncEventHandler};
use super::progress_tracker::{SyncProgressTracker, SyncStats};
use super::types::*;
use crate::merkle::MerkleTreeBuilder;
use crate::monero::{MoneroError, SourceLedgerClient};
use crate::solana::{DestinationLedgerClient, PostOutcome, RootRecord, SolanaError};
use crate::utils::format_root_prefix;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives block-by-block root commitment from the source chain to the destination chain.
pub struct OracleSyncEngine {
	source: Box<dyn SourceLedgerClient>,
	destination: Box<dyn DestinationLedgerClient>,
	builder: MerkleTreeBuilder,
	config: EngineConfig,
	shutdown: CancellationToken,
	state: EngineState,
	/// Highest height known to have a root on the destination chain.
	cursor: u64,
	progress: SyncProgressTracker,
	events: EventDispatcher,
}

impl OracleSyncEngine {
	/// Create an engine over already-constructed clients.
	///
	/// The cursor starts at `config.start_height` and is re-synchronised from the
	/// destination chain by [`start`](Self::start).
	pub fn new(
		source: Box<dyn SourceLedgerClient>,
		destination: Box<dyn DestinationLedgerClient>,
		config: EngineConfig,
		shutdown: CancellationToken,
	) -> Self {
		let cursor = config.start_height;

		Self {
			source,
			destination,
			builder: MerkleTreeBuilder::new(),
			config,
			shutdown,
			state: EngineState::Uninitialized,
			cursor,
			progress: SyncProgressTracker::new(cursor),
			events: EventDispatcher::new(),
		}
	}

	pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
		self.events.register_handler(handler);
	}

	pub fn state(&self) -> EngineState {
		self.state
	}

	pub fn cursor(&self) -> u64 {
		self.cursor
	}

	pub fn progress(&self) -> SyncStats {
		self.progress.get_stats()
	}

	/// Token that stops the loop when cancelled. Clone it before calling `start`.
	pub fn shutdown_token(&self) -> CancellationToken {
		self.shutdown.clone()
	}

	/// Request a stop. Takes effect at the start of the next pass; an in-flight block is
	/// allowed to finish.
	pub fn stop(&self) {
		self.shutdown.cancel();
	}

	/// Create the oracle-state record on the destination chain.
	///
	/// An existing record is reported as `InitializeOutcome::AlreadyInitialized`.
	pub async fn initialize(&mut self) -> Result<InitializeOutcome, OracleError> {
		self.state = EngineState::Initializing;

		match self.destination.initialize_oracle_state().await {
			Ok(signature) => {
				info!("Oracle initialized by {}: tx {}", self.destination.authority(), signature);
				self.state = EngineState::Ready;
				Ok(InitializeOutcome::Initialized { signature })
			}
			Err(SolanaError::AlreadyInitialized) => {
				info!("Oracle already initialized");
				self.state = EngineState::Ready;
				Ok(InitializeOutcome::AlreadyInitialized)
			}
			Err(e) => {
				error!("Failed to initialize oracle: {}", e);
				self.state = EngineState::Faulted;
				Err(e.into())
			}
		}
	}

	/// Check both chains, restore the cursor and run the sync loop until stopped.
	///
	/// # Errors
	/// `SourceUnreachable` if the source fails its liveness check, `NotInitialized` if the
	/// destination has no oracle-state record, or any fatal error raised inside the loop.
	pub async fn start(&mut self) -> Result<(), OracleError> {
		if let Err(e) = self.restore_cursor().await {
			error!("Oracle failed to start: {}", e);
			self.state = EngineState::Faulted;
			return Err(e);
		}

		self.state = EngineState::Ready;
		info!(
			"Starting sync from block {} (poll every {:?}, retry after {:?})",
			self.cursor.saturating_add(1),
			self.config.poll_interval,
			self.config.retry_backoff
		);

		self.run().await
	}

	async fn restore_cursor(&mut self) -> Result<(), OracleError> {
		self.state = EngineState::Initializing;

		if !self.source.is_reachable().await {
			return Err(OracleError::SourceUnreachable);
		}

		let persisted = self
			.destination
			.get_oracle_state()
			.await?
			.ok_or(OracleError::NotInitialized)?;

		debug!(
			"Oracle state: authority {}, last block {}, {} roots",
			persisted.authority, persisted.last_updated_block, persisted.total_roots_posted
		);

		self.cursor = self.config.start_height.max(persisted.last_updated_block);
		self.progress = SyncProgressTracker::new(self.cursor);
		Ok(())
	}

	async fn run(&mut self) -> Result<(), OracleError> {
		while !self.shutdown.is_cancelled() {
			self.state = EngineState::Syncing;

			let delay = match self.sync_once().await {
				Ok(chain_height) => {
					self.events
						.dispatch(&SyncEvent::CaughtUp {
							cursor: self.cursor,
							chain_height,
						})
						.await;
					self.config.poll_interval
				}
				Err(e) if e.is_fatal() => {
					error!("Sync halted: {}", e);
					self.state = EngineState::Faulted;
					return Err(e);
				}
				Err(e) => {
					warn!(
						"Sync pass failed at block {}: {}. Retrying in {:?}",
						self.cursor.saturating_add(1),
						e,
						self.config.retry_backoff
					);
					self.progress.record_failure();
					self.events
						.dispatch(&SyncEvent::IterationFailed {
							cursor: self.cursor,
							error: e.to_string(),
						})
						.await;
					self.config.retry_backoff
				}
			};

			self.state = EngineState::Waiting;
			tokio::time::sleep(delay).await;
		}

		self.state = EngineState::Stopped;
		self.progress.log_progress(true);
		self.progress.report_gaps();
		info!("Oracle stopped at block {}", self.cursor);
		Ok(())
	}

	/// One pass: process every height in `cursor + 1 ..= tip` in ascending order.
	///
	/// The range is fixed when the pass starts. Returns the tip that was observed.
	pub async fn sync_once(&mut self) -> Result<u64, OracleError> {
		let chain_height = self.source.current_height().await?;

		if chain_height <= self.cursor {
			debug!("No new blocks (cursor {}, tip {})", self.cursor, chain_height);
			return Ok(chain_height);
		}

		// chain_height > cursor, so this cannot overflow.
		let first = self.cursor + 1;
		info!("Processing blocks {} to {}", first, chain_height);

		for height in first..=chain_height {
			self.process_block(height).await?;
		}

		self.progress.log_progress(false);
		Ok(chain_height)
	}

	/// Commit one block.
	///
	/// A block without outputs is skipped and leaves the cursor unchanged. Otherwise the
	/// block's root is posted (or found already posted) and the cursor advances to `height`.
	pub async fn process_block(&mut self, height: u64) -> Result<BlockOutcome, OracleError> {
		let outputs = self.source.outputs_for_block(height).await?;

		if outputs.is_empty() {
			debug!("Block {} has no outputs", height);
			self.progress.record_empty(height);
			self.events
				.dispatch(&SyncEvent::EmptyBlockSkipped {
					block_height: height,
				})
				.await;
			return Ok(BlockOutcome::Empty);
		}

		let output_count = u32::try_from(outputs.len()).map_err(|_| {
			MoneroError::ProtocolError(format!(
				"Block {} has {} outputs, more than a root record can count",
				height,
				outputs.len()
			))
		})?;

		let tree = self.builder.build_from_outputs(&outputs)?;
		let root = tree.root();
		let block = self.source.block_metadata(height).await?;

		debug!(
			"Block {}: {} outputs, root {}",
			height,
			output_count,
			format_root_prefix(&root)
		);

		let record = RootRecord {
			block_height: height,
			root_hash: root,
			timestamp: block.timestamp,
			output_count,
		};

		let outcome = match self.destination.post_root(&record).await? {
			PostOutcome::Posted { signature } => {
				self.progress.record_posted(height);
				self.events
					.dispatch(&SyncEvent::RootPosted {
						block_height: height,
						root,
						output_count,
						signature,
					})
					.await;
				BlockOutcome::Posted {
					root,
					output_count,
					signature,
				}
			}
			PostOutcome::AlreadyPosted => {
				self.progress.record_already_posted(height);
				self.events
					.dispatch(&SyncEvent::RootAlreadyPosted {
						block_height: height,
						root,
					})
					.await;
				BlockOutcome::AlreadyPosted { root, output_count }
			}
		};

		self.cursor = self.cursor.max(height);
		Ok(outcome)
	}
}
