//! Event system for oracle synchronization.
//!
//! The engine emits a `SyncEvent` for every height it settles and for every pass that
//! catches up or fails. Handlers registered on the `EventDispatcher` observe these events
//! without being part of the posting path, so a failing handler never blocks a root.

use crate::merkle::Hash32;
use crate::oracle::OracleError;
use crate::utils::format_root_prefix;
use solana_sdk::signature::Signature;
use tracing::{debug, error, info, warn};

/// Events that occur during oracle synchronization
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A new root was written for a height
    RootPosted {
        block_height: u64,
        root: Hash32,
        output_count: u32,
        signature: Signature,
    },
    /// A root for the height was already on the destination chain
    RootAlreadyPosted { block_height: u64, root: Hash32 },
    /// The block had no outputs and was left for a later pass
    EmptyBlockSkipped { block_height: u64 },
    /// A pass finished with the cursor at the chain tip
    CaughtUp { cursor: u64, chain_height: u64 },
    /// A pass failed and will be retried after the backoff
    IterationFailed { cursor: u64, error: String },
}

/// Trait for handling sync events.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
    /// Handle a sync event.
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), OracleError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in the order they are registered. Errors from one handler are
/// logged and do not stop the others.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.handlers.push(handler);
    }

    pub async fn dispatch(&mut self, event: &SyncEvent) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }
    }
}

/// Operator-facing log of settled heights.
///
/// Also watches for a run of failed passes and raises it at error level once the run
/// reaches `failure_alert_threshold`, then again at every further multiple of it.
pub struct LoggingEventHandler {
    failure_alert_threshold: u32,
    consecutive_failures: u32,
}

impl LoggingEventHandler {
    pub fn new(failure_alert_threshold: u32) -> Self {
        Self {
            failure_alert_threshold: failure_alert_threshold.max(1),
            consecutive_failures: 0,
        }
    }
}

#[async_trait::async_trait]
impl SyncEventHandler for LoggingEventHandler {
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), OracleError> {
        match event {
            SyncEvent::RootPosted {
                block_height,
                root,
                output_count,
                signature,
            } => {
                self.consecutive_failures = 0;
                info!(
                    "Block {}: root {} over {} outputs (tx {})",
                    block_height,
                    format_root_prefix(root),
                    output_count,
                    signature
                );
            }
            SyncEvent::RootAlreadyPosted { block_height, root } => {
                self.consecutive_failures = 0;
                info!(
                    "Block {}: root {} already posted, skipping",
                    block_height,
                    format_root_prefix(root)
                );
            }
            SyncEvent::EmptyBlockSkipped { block_height } => {
                info!("Block {} has no outputs, skipping", block_height);
            }
            SyncEvent::CaughtUp {
                cursor,
                chain_height,
            } => {
                self.consecutive_failures = 0;
                debug!("Caught up at block {} (tip {})", cursor, chain_height);
            }
            SyncEvent::IterationFailed { cursor, error } => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures % self.failure_alert_threshold == 0 {
                    error!(
                        "{} sync passes in a row failed after block {}; last error: {}",
                        self.consecutive_failures, cursor, error
                    );
                } else {
                    warn!(
                        "Sync pass {} in a row failed after block {}",
                        self.consecutive_failures, cursor
                    );
                }
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}
