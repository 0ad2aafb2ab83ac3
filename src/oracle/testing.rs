//! In-memory chain clients for engine tests.

use super::OracleError;
use super::events::{SyncEvent, SyncEventHandler};
use crate::monero::{Block, EcdhInfo, MoneroError, MoneroTransaction, Output, SourceLedgerClient};
use crate::solana::{DestinationLedgerClient, OracleState, PostOutcome, RootRecord, SolanaError};
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

const OUTPUTS_PER_BLOCK: u32 = 3;

struct SourceInner {
	height: u64,
	empty_blocks: HashSet<u64>,
	reachable: bool,
	failing_height_queries: usize,
	output_requests: Vec<u64>,
}

/// Scripted source chain. Every block holds one transaction with three outputs unless
/// marked empty.
#[derive(Clone)]
pub struct InMemorySource {
	inner: Arc<Mutex<SourceInner>>,
}

impl InMemorySource {
	pub fn new(height: u64) -> Self {
		Self {
			inner: Arc::new(Mutex::new(SourceInner {
				height,
				empty_blocks: HashSet::new(),
				reachable: true,
				failing_height_queries: 0,
				output_requests: Vec::new(),
			})),
		}
	}

	pub fn with_empty_block(self, height: u64) -> Self {
		self.inner.lock().unwrap().empty_blocks.insert(height);
		self
	}

	pub fn set_reachable(&self, reachable: bool) {
		self.inner.lock().unwrap().reachable = reachable;
	}

	/// Make the next `count` tip queries fail with an RPC error.
	pub fn fail_height_queries(&self, count: usize) {
		self.inner.lock().unwrap().failing_height_queries = count;
	}

	/// Heights passed to `outputs_for_block`, in call order.
	pub fn output_requests(&self) -> Vec<u64> {
		self.inner.lock().unwrap().output_requests.clone()
	}

	fn tx_hash(height: u64) -> String {
		format!("{height:064x}")
	}

	fn outputs(height: u64) -> Vec<Output> {
		(0..OUTPUTS_PER_BLOCK)
			.map(|index| Output {
				tx_hash: Self::tx_hash(height),
				output_index: index,
				amount: 0,
				stealth_address: format!("stealth-{height}-{index}"),
				one_time_address: format!("commitment-{height}-{index}"),
				ecdh_info: EcdhInfo {
					amount: format!("{:016x}", height * 10 + u64::from(index)),
					mask: "0".into(),
				},
				block_height: height,
			})
			.collect()
	}

	fn has_outputs(&self, height: u64) -> bool {
		let inner = self.inner.lock().unwrap();
		height <= inner.height && !inner.empty_blocks.contains(&height)
	}
}

#[async_trait]
impl SourceLedgerClient for InMemorySource {
	async fn current_height(&self) -> Result<u64, MoneroError> {
		let mut inner = self.inner.lock().unwrap();
		if inner.failing_height_queries > 0 {
			inner.failing_height_queries -= 1;
			return Err(MoneroError::RpcError {
				code: -9,
				message: "daemon busy".into(),
			});
		}
		Ok(inner.height)
	}

	async fn block_metadata(&self, height: u64) -> Result<Block, MoneroError> {
		Ok(Block {
			height,
			hash: format!("{:064x}", height + 1),
			timestamp: 1_700_000_000 + height as i64 * 120,
			tx_hashes: if self.has_outputs(height) {
				vec![Self::tx_hash(height)]
			} else {
				Vec::new()
			},
		})
	}

	async fn outputs_for_block(&self, height: u64) -> Result<Vec<Output>, MoneroError> {
		self.inner.lock().unwrap().output_requests.push(height);

		if self.has_outputs(height) {
			Ok(Self::outputs(height))
		} else {
			Ok(Vec::new())
		}
	}

	async fn transaction(&self, tx_hash: &str) -> Result<MoneroTransaction, MoneroError> {
		let height = u64::from_str_radix(tx_hash, 16)
			.ok()
			.filter(|height| self.has_outputs(*height))
			.ok_or_else(|| MoneroError::TransactionNotFound(tx_hash.to_string()))?;

		Ok(MoneroTransaction {
			hash: tx_hash.to_string(),
			block_height: height,
			timestamp: 1_700_000_000 + height as i64 * 120,
			outputs: Self::outputs(height),
		})
	}

	async fn is_reachable(&self) -> bool {
		self.inner.lock().unwrap().reachable
	}
}

struct DestinationInner {
	authority: Pubkey,
	state: Option<OracleState>,
	roots: BTreeMap<u64, RootRecord>,
	post_attempts: Vec<u64>,
	lose_next_confirmation: bool,
	signatures_issued: u8,
}

impl DestinationInner {
	fn next_signature(&mut self) -> Signature {
		self.signatures_issued = self.signatures_issued.wrapping_add(1);
		Signature::from([self.signatures_issued; 64])
	}
}

/// Oracle program stand-in with write-once root records.
#[derive(Clone)]
pub struct InMemoryDestination {
	inner: Arc<Mutex<DestinationInner>>,
}

impl Default for InMemoryDestination {
	fn default() -> Self {
		Self {
			inner: Arc::new(Mutex::new(DestinationInner {
				authority: Pubkey::new_unique(),
				state: None,
				roots: BTreeMap::new(),
				post_attempts: Vec::new(),
				lose_next_confirmation: false,
				signatures_issued: 0,
			})),
		}
	}
}

impl InMemoryDestination {
	/// An oracle whose state record says `last_updated_block`.
	pub fn initialized(last_updated_block: u64) -> Self {
		let destination = Self::default();
		{
			let mut inner = destination.inner.lock().unwrap();
			inner.state = Some(OracleState {
				authority: inner.authority,
				last_updated_block,
				total_roots_posted: 0,
			});
		}
		destination
	}

	/// The next post lands on chain but reports a confirmation timeout.
	pub fn lose_next_confirmation(&self) {
		self.inner.lock().unwrap().lose_next_confirmation = true;
	}

	/// Heights passed to `post_root`, in call order.
	pub fn post_attempts(&self) -> Vec<u64> {
		self.inner.lock().unwrap().post_attempts.clone()
	}

	pub fn root_heights(&self) -> Vec<u64> {
		self.inner.lock().unwrap().roots.keys().copied().collect()
	}

	pub fn root(&self, height: u64) -> Option<RootRecord> {
		self.inner.lock().unwrap().roots.get(&height).copied()
	}

	pub fn oracle_state(&self) -> Option<OracleState> {
		self.inner.lock().unwrap().state
	}
}

#[async_trait]
impl DestinationLedgerClient for InMemoryDestination {
	fn authority(&self) -> Pubkey {
		self.inner.lock().unwrap().authority
	}

	async fn initialize_oracle_state(&self) -> Result<Signature, SolanaError> {
		let mut inner = self.inner.lock().unwrap();
		if inner.state.is_some() {
			return Err(SolanaError::AlreadyInitialized);
		}

		inner.state = Some(OracleState {
			authority: inner.authority,
			last_updated_block: 0,
			total_roots_posted: 0,
		});
		Ok(inner.next_signature())
	}

	async fn post_root(&self, record: &RootRecord) -> Result<PostOutcome, SolanaError> {
		let mut inner = self.inner.lock().unwrap();
		inner.post_attempts.push(record.block_height);

		if inner.roots.contains_key(&record.block_height) {
			return Ok(PostOutcome::AlreadyPosted);
		}

		let Some(state) = inner.state.as_mut() else {
			return Err(SolanaError::TransactionError(
				"oracle state account missing".into(),
			));
		};
		state.last_updated_block = record.block_height;
		state.total_roots_posted += 1;
		inner.roots.insert(record.block_height, *record);

		if std::mem::take(&mut inner.lose_next_confirmation) {
			let signature = inner.next_signature();
			return Err(SolanaError::ConfirmationTimeout(signature.to_string()));
		}

		Ok(PostOutcome::Posted {
			signature: inner.next_signature(),
		})
	}

	async fn get_root(&self, block_height: u64) -> Result<Option<RootRecord>, SolanaError> {
		Ok(self.root(block_height))
	}

	async fn get_oracle_state(&self) -> Result<Option<OracleState>, SolanaError> {
		Ok(self.oracle_state())
	}
}

/// Handler that keeps every event it sees.
#[derive(Clone, Default)]
pub struct EventRecorder {
	events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl EventRecorder {
	pub fn events(&self) -> Vec<SyncEvent> {
		self.events.lock().unwrap().clone()
	}
}

#[async_trait]
impl SyncEventHandler for EventRecorder {
	async fn handle(&mut self, event: &SyncEvent) -> Result<(), OracleError> {
		self.events.lock().unwrap().push(event.clone());
		Ok(())
	}

	fn name(&self) -> &'static str {
		"event-recorder"
	}
}
