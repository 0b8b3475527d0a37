//! Consumer observer: the tap on a tracking consumer's processing loop.
//!
//! The host processing loop calls [`BatchHook::on_batch_committed`] after it
//! has handled and committed a batch. The observer publishes the position
//! and timestamp of the batch's *first* event as one immutable
//! [`ConsumerState`] through an atomic pointer swap, so readers on other
//! threads never see a position paired with another batch's timestamp.
//!
//! # Thread Safety
//!
//! Publishing is a lock-free compare-and-swap loop and readers take a
//! lock-free snapshot. No call here blocks or performs I/O.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use helix_core::SegmentId;
use tracing::{debug, info, warn};

use crate::types::{ConsumerState, ProcessorState, TrackedEvent};

// -----------------------------------------------------------------------------
// Batch Hook
// -----------------------------------------------------------------------------

/// Extension point invoked by a tracking consumer's processing loop.
pub trait BatchHook: Send + Sync {
    /// Called after `batch` has been handled and its position committed.
    ///
    /// Must return quickly; it runs on the consumer's hot path.
    fn on_batch_committed(&self, segment: SegmentId, batch: &[TrackedEvent]);

    /// Called when the consumer moves through its lifecycle.
    fn on_state_change(&self, _state: ProcessorState) {}

    /// Called when the consumer discards its position to replay the log.
    fn on_reset(&self) {}
}

impl<T: BatchHook + ?Sized> BatchHook for Arc<T> {
    fn on_batch_committed(&self, segment: SegmentId, batch: &[TrackedEvent]) {
        (**self).on_batch_committed(segment, batch);
    }

    fn on_state_change(&self, state: ProcessorState) {
        (**self).on_state_change(state);
    }

    fn on_reset(&self) {
        (**self).on_reset();
    }
}

// -----------------------------------------------------------------------------
// Consumer Observer
// -----------------------------------------------------------------------------

/// Records what a tracking consumer has processed.
#[derive(Debug, Default)]
pub struct ConsumerObserver {
    /// Last published state; `None` until the first batch.
    state: ArcSwapOption<ConsumerState>,
    /// Lifecycle of the observed consumer, as `ProcessorState as u8`.
    processor_state: AtomicU8,
    /// Set once the consumer has reported `Running`.
    has_run: AtomicBool,
    /// Set once a batch was dropped because the consumer had stopped.
    warned_stopped_batch: AtomicBool,
    /// Batches accepted for publication.
    batches_observed: AtomicU64,
    /// Events in those batches.
    events_observed: AtomicU64,
}

impl ConsumerObserver {
    /// Creates an observer with nothing recorded and the consumer stopped.
    ///
    /// Batches are recorded without any lifecycle calls; reporting
    /// transitions only makes the observer drop batches delivered after the
    /// consumer has stopped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an observer for a consumer that is already running.
    #[must_use]
    pub fn running() -> Self {
        let observer = Self::default();
        observer.set_state(ProcessorState::Running);
        observer
    }

    /// Returns the last published consumer state, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<ConsumerState>> {
        self.state.load_full()
    }

    /// Returns the lifecycle state of the observed consumer.
    #[must_use]
    pub fn processor_state(&self) -> ProcessorState {
        ProcessorState::from_u8(self.processor_state.load(Ordering::Acquire))
    }

    /// Records a lifecycle transition of the observed consumer.
    pub fn set_state(&self, state: ProcessorState) {
        if state == ProcessorState::Running {
            self.has_run.store(true, Ordering::Release);
        }
        let previous =
            ProcessorState::from_u8(self.processor_state.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            debug!(from = %previous, to = %state, "Processor state changed");
        }
    }

    /// Returns the number of batches accepted for publication.
    #[must_use]
    pub fn batches_observed(&self) -> u64 {
        self.batches_observed.load(Ordering::Relaxed)
    }

    /// Returns the number of events in accepted batches.
    #[must_use]
    pub fn events_observed(&self) -> u64 {
        self.events_observed.load(Ordering::Relaxed)
    }

    /// Publishes the first event of `batch` as the consumer state.
    ///
    /// Returns true if the state was published. Empty batches, batches
    /// delivered after a running consumer reported `Stopping` or `Stopped`,
    /// and batches that start below the published position (a slower
    /// segment finishing late) leave the state unchanged.
    pub fn record_batch(&self, segment: SegmentId, batch: &[TrackedEvent]) -> bool {
        let Some(first) = batch.first() else {
            debug!(segment = %segment, "Ignoring empty batch");
            return false;
        };

        let processor_state = self.processor_state();
        if self.has_stopped(processor_state) {
            if self.warned_stopped_batch.swap(true, Ordering::Relaxed) {
                debug!(
                    segment = %segment,
                    state = %processor_state,
                    "Ignoring batch delivered after the consumer stopped"
                );
            } else {
                warn!(
                    segment = %segment,
                    state = %processor_state,
                    index = first.position.index(),
                    "Ignoring batch delivered after the consumer stopped"
                );
            }
            return false;
        }

        self.batches_observed.fetch_add(1, Ordering::Relaxed);
        self.events_observed
            .fetch_add(batch.len() as u64, Ordering::Relaxed);

        let candidate = Arc::new(ConsumerState::new(first.position.clone(), first.timestamp));
        let mut published = false;
        self.state.rcu(|current| match current {
            Some(existing) if existing.last_position > candidate.last_position => {
                published = false;
                Some(Arc::clone(existing))
            }
            _ => {
                published = true;
                Some(Arc::clone(&candidate))
            }
        });

        if !published {
            debug!(
                segment = %segment,
                index = candidate.last_position.index(),
                "Not publishing batch behind the current position"
            );
        }
        published
    }

    fn has_stopped(&self, state: ProcessorState) -> bool {
        matches!(state, ProcessorState::Stopping | ProcessorState::Stopped)
            && self.has_run.load(Ordering::Acquire)
    }

    /// Forgets the published state, as when the consumer replays the log.
    pub fn reset(&self) {
        self.state.store(None);
        info!("Consumer state reset");
    }
}

impl BatchHook for ConsumerObserver {
    fn on_batch_committed(&self, segment: SegmentId, batch: &[TrackedEvent]) {
        self.record_batch(segment, batch);
    }

    fn on_state_change(&self, state: ProcessorState) {
        self.set_state(state);
    }

    fn on_reset(&self) {
        self.reset();
    }
}
