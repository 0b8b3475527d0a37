//! Status reporting for the simulation.
//!
//! `ReportingHook` wraps the consumer observer so each committed batch also
//! schedules the progress line on a separate task, keeping the oracle call
//! off the processing loop. `report_status` logs the snapshot on a timer
//! until the processor has caught up with a finished producer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use helix_catchup::{
    BatchHook, ConsumerObserver, HeadOracle, ProcessorState, StatusFacade, StatusSnapshot,
    TrackedEvent,
};
use helix_core::SegmentId;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Batch hook that records into the observer and logs batch progress.
pub struct ReportingHook<O: HeadOracle + 'static> {
    facade: Arc<StatusFacade<O>>,
    runtime: Handle,
}

impl<O: HeadOracle + 'static> ReportingHook<O> {
    /// Creates a hook spawning progress lines on `runtime`.
    #[must_use]
    pub const fn new(facade: Arc<StatusFacade<O>>, runtime: Handle) -> Self {
        Self { facade, runtime }
    }

    fn observer(&self) -> &ConsumerObserver {
        self.facade.observer()
    }
}

impl<O: HeadOracle + 'static> BatchHook for ReportingHook<O> {
    fn on_batch_committed(&self, segment: SegmentId, batch: &[TrackedEvent]) {
        if !self.observer().record_batch(segment, batch) {
            return;
        }
        if self.facade.config().log_batch_progress {
            let facade = Arc::clone(&self.facade);
            let batch_len = batch.len();
            self.runtime.spawn(async move {
                facade.log_batch_progress(batch_len).await;
            });
        }
    }

    fn on_state_change(&self, state: ProcessorState) {
        self.observer().set_state(state);
    }

    fn on_reset(&self) {
        self.observer().reset();
    }
}

/// Logs the status every `interval` until shut down.
///
/// Once `production_done` is set and a snapshot reports ready, signals
/// `caught_up_tx` once and keeps reporting.
pub async fn report_status<O: HeadOracle>(
    facade: Arc<StatusFacade<O>>,
    interval: Duration,
    timeout: Duration,
    production_done: Arc<AtomicBool>,
    caught_up_tx: mpsc::Sender<StatusSnapshot>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    let mut signalled = false;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Status reporter shutting down");
                break;
            }
            _ = ticker.tick() => {
                let status = facade.get_status_within(timeout).await;
                info!(
                    processor = %facade.config().processor_name,
                    state = %facade.observer().processor_state(),
                    events = facade.observer().events_observed(),
                    %status,
                    "Catch-up status"
                );

                let caught_up = status.ready()
                    && facade.observer().current().is_some()
                    && production_done.load(Ordering::Acquire);
                if caught_up && !signalled {
                    signalled = true;
                    // Receiver may be gone if main is already exiting.
                    let _ = caught_up_tx.send(status).await;
                }
            }
        }
    }
}
