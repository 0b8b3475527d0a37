//! Simulated tracking processor.
//!
//! Reads batches from the log starting at its committed position, "handles"
//! them, commits the new position to the token store and then calls its
//! batch hook. The processor knows nothing about catch-up tracking; the
//! observer is injected as the hook.

use std::time::Duration;

use helix_catchup::{BatchHook, CatchupResult, ProcessorState, SimulatedEventLog};
use helix_core::{Position, SegmentId};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::tokens::TokenStore;

/// Configuration for the simulated tracking processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Processor name, the key for its tokens.
    pub name: String,
    /// Segment this processor handles.
    pub segment: SegmentId,
    /// Maximum events per batch.
    pub batch_size: usize,
    /// Gap window passed to the log reader.
    pub max_gap_offset: u64,
    /// Pause between polls of the log.
    pub poll_interval: Duration,
    /// Discard the committed position and replay the log on start.
    pub reset_on_start: bool,
}

/// A tracking processor over a [`SimulatedEventLog`].
pub struct TrackingProcessor<T: TokenStore, H: BatchHook> {
    config: ProcessorConfig,
    log: SimulatedEventLog,
    tokens: T,
    hook: H,
    /// Batches committed since start.
    batches: u64,
}

impl<T: TokenStore, H: BatchHook> TrackingProcessor<T, H> {
    /// Creates a processor.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    #[must_use]
    pub fn new(config: ProcessorConfig, log: SimulatedEventLog, tokens: T, hook: H) -> Self {
        // TigerStyle: Assert preconditions.
        assert!(config.batch_size > 0, "batch_size must be positive");
        Self {
            config,
            log,
            tokens,
            hook,
            batches: 0,
        }
    }

    /// Runs until `shutdown_rx` fires, returning the number of events handled.
    ///
    /// The hook sees `Starting`, `Running`, `Stopping` and `Stopped` in that
    /// order, and `Stopped` even when processing fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the token store or the log reader fails.
    pub async fn run(mut self, shutdown_rx: mpsc::Receiver<()>) -> CatchupResult<u64> {
        info!(processor = %self.config.name, segment = %self.config.segment, "Starting tracking processor");
        self.hook.on_state_change(ProcessorState::Starting);

        let result = self.process(shutdown_rx).await;

        self.hook.on_state_change(ProcessorState::Stopping);
        self.hook.on_state_change(ProcessorState::Stopped);
        info!(processor = %self.config.name, "Tracking processor stopped");
        result
    }

    async fn process(&mut self, mut shutdown_rx: mpsc::Receiver<()>) -> CatchupResult<u64> {
        if self.config.reset_on_start {
            self.tokens
                .reset_token(&self.config.name, self.config.segment)
                .await?;
            self.hook.on_reset();
            info!(processor = %self.config.name, "Replaying log from the start");
        }

        let mut position = self
            .tokens
            .fetch_token(&self.config.name, self.config.segment)
            .await?;
        debug!(
            processor = %self.config.name,
            position = ?position.as_ref().map(Position::index),
            "Restored position"
        );

        self.hook.on_state_change(ProcessorState::Running);

        let mut poll = tokio::time::interval(self.config.poll_interval);
        let mut handled = 0u64;
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!(processor = %self.config.name, "Tracking processor shutting down");
                    break;
                }
                _ = poll.tick() => {
                    handled += self.process_batch(&mut position).await?;
                }
            }
        }
        Ok(handled)
    }

    /// Handles one batch, if any, and returns its size.
    async fn process_batch(&mut self, position: &mut Option<Position>) -> CatchupResult<u64> {
        let batch = self.log.read_batch(
            position.as_ref(),
            self.config.batch_size,
            self.config.max_gap_offset,
        )?;
        let Some(last) = batch.last() else {
            return Ok(0);
        };

        let next_position = last.position.clone();

        self.tokens
            .store_token(&self.config.name, self.config.segment, &next_position)
            .await?;
        self.hook.on_batch_committed(self.config.segment, &batch);
        self.batches += 1;

        debug!(
            processor = %self.config.name,
            batch = self.batches,
            events = batch.len(),
            position = %next_position,
            "Committed batch"
        );
        *position = Some(next_position);
        Ok(batch.len() as u64)
    }
}
