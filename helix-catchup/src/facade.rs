//! Status facade: the query surface for catch-up status.
//!
//! `StatusFacade` reads the observer's published state, asks the oracle for
//! the head and hands both to [`compute_snapshot`]. It holds no lock across
//! the oracle call, and it never returns an error: upstream failures degrade
//! to an indeterminate snapshot and are logged.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::error::{CatchupError, CatchupResult, UnavailableCause};
use crate::observer::ConsumerObserver;
use crate::oracle::HeadOracle;
use crate::snapshot::compute_snapshot;
use crate::types::{CatchupConfig, HeadState, StatusSnapshot};

// -----------------------------------------------------------------------------
// Status Facade
// -----------------------------------------------------------------------------

/// Thread-safe catch-up status for one tracking consumer.
///
/// # Thread Safety
///
/// The facade is `Send + Sync` when its oracle is, and `get_status` may be
/// called from any task at any point of the consumer's lifecycle.
pub struct StatusFacade<O: HeadOracle> {
    /// Configuration.
    config: CatchupConfig,
    /// Observer fed by the consumer's processing loop.
    observer: Arc<ConsumerObserver>,
    /// Source of the head of the log.
    oracle: O,
}

impl<O: HeadOracle> StatusFacade<O> {
    /// Creates a facade over an observer and a head oracle.
    #[must_use]
    pub const fn new(config: CatchupConfig, observer: Arc<ConsumerObserver>, oracle: O) -> Self {
        Self {
            config,
            observer,
            oracle,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CatchupConfig {
        &self.config
    }

    /// Returns the observer this facade reads from.
    #[must_use]
    pub const fn observer(&self) -> &Arc<ConsumerObserver> {
        &self.observer
    }

    /// Returns the head oracle.
    #[must_use]
    pub const fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Returns the current catch-up status.
    ///
    /// A consumer that has processed nothing is reported caught up without
    /// consulting the oracle.
    pub async fn get_status(&self) -> StatusSnapshot {
        let Some(consumer) = self.observer.current() else {
            debug!(
                processor = %self.config.processor_name,
                state = %self.observer.processor_state(),
                "No batch processed yet, reporting caught up"
            );
            return StatusSnapshot::caught_up();
        };

        let head = self.oracle.fetch_head().await;
        self.log_head_failure(&head);
        compute_snapshot(Some(&consumer), &head)
    }

    /// Returns the current status, giving up on the oracle after `timeout`.
    ///
    /// A timeout degrades to the indeterminate snapshot like any other
    /// upstream failure.
    pub async fn get_status_within(&self, timeout: Duration) -> StatusSnapshot {
        if let Ok(status) = tokio::time::timeout(timeout, self.get_status()).await {
            return status;
        }

        #[allow(clippy::cast_possible_truncation)]
        let head = Err(CatchupError::UpstreamUnavailable {
            cause: UnavailableCause::TimedOut {
                waited_ms: timeout.as_millis() as u64,
            },
        });
        self.log_head_failure(&head);
        compute_snapshot(self.observer.current().as_deref(), &head)
    }

    /// Queries the status and logs the progress line for a processed batch.
    pub async fn log_batch_progress(&self, batch_len: usize) -> StatusSnapshot {
        let status = self.get_status().await;
        if self.config.log_batch_progress {
            info!(
                "{}",
                BatchProgress {
                    batch_len,
                    processor: &self.config.processor_name,
                    status: &status,
                }
            );
        }
        status
    }

    fn log_head_failure(&self, head: &CatchupResult<HeadState>) {
        match head {
            Ok(_) => {}
            Err(err) if err.is_empty_log() => {
                debug!(processor = %self.config.processor_name, "Log is empty, nothing to catch up to");
            }
            Err(err) => {
                error!(processor = %self.config.processor_name, error = %err, "Failed to fetch head of log");
            }
        }
    }
}

/// Progress line logged after a processed batch.
struct BatchProgress<'a> {
    batch_len: usize,
    processor: &'a str,
    status: &'a StatusSnapshot,
}

impl fmt::Display for BatchProgress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processing {} messages [{}], {}%, currently {} millis behind",
            self.batch_len,
            self.processor,
            self.status.progress_percent(),
            self.status.lag()
        )
    }
}

#[cfg(test)]
mod tests {
    use helix_core::{Position, SegmentId, Timestamp};

    use super::*;
    use crate::event_log::{SimulatedEventLog, SimulatedLogFaultConfig};
    use crate::types::{Lag, ProcessorState, TrackedEvent};

    fn facade(log: SimulatedEventLog) -> StatusFacade<SimulatedEventLog> {
        let observer = Arc::new(ConsumerObserver::new());
        observer.set_state(ProcessorState::Running);
        StatusFacade::new(CatchupConfig::for_testing(), observer, log)
    }

    fn append_events(log: &SimulatedEventLog, count: u64, start_ms: i64, step_ms: i64) {
        for i in 0..count {
            #[allow(clippy::cast_possible_wrap)]
            let ts = Timestamp::from_millis(start_ms + step_ms * i as i64);
            log.append(ts, "e");
        }
    }

    fn observe(facade: &StatusFacade<SimulatedEventLog>, index: u64, millis: i64) {
        let batch = [TrackedEvent::new(
            Position::new(index),
            Timestamp::from_millis(millis),
            "e",
        )];
        assert!(facade.observer().record_batch(SegmentId::new(0), &batch));
    }

    #[tokio::test]
    async fn test_status_before_any_batch() {
        let log = SimulatedEventLog::new(42);
        append_events(&log, 101, 0, 10);
        let facade = facade(log);

        // Head is at 100, but nothing processed yet.
        assert_eq!(facade.get_status().await, StatusSnapshot::caught_up());
    }

    #[tokio::test]
    async fn test_half_way() {
        let log = SimulatedEventLog::new(42);
        append_events(&log, 101, 0, 10);
        let facade = facade(log);

        // Event 50 at 500ms, head event 100 at 1000ms.
        observe(&facade, 50, 500);

        let status = facade.get_status().await;
        assert_eq!(status, StatusSnapshot::new(false, 50, Lag::Millis(500)));
    }

    #[tokio::test]
    async fn test_caught_up() {
        let log = SimulatedEventLog::new(42);
        append_events(&log, 101, 0, 10);
        let facade = facade(log);

        observe(&facade, 100, 1_000);

        let status = facade.get_status().await;
        assert_eq!(status, StatusSnapshot::new(true, 100, Lag::Millis(0)));
    }

    #[tokio::test]
    async fn test_oracle_failure_degrades() {
        let log = SimulatedEventLog::new(42);
        append_events(&log, 101, 0, 10);
        let facade = facade(log);
        observe(&facade, 50, 500);

        facade.oracle().fault_config().force_unavailable = true;
        assert_eq!(facade.get_status().await, StatusSnapshot::indeterminate());

        // Recovers on the next query.
        assert_eq!(facade.get_status().await.progress_percent(), 50);
    }

    #[tokio::test]
    async fn test_idempotent_without_progress() {
        let log = SimulatedEventLog::new(42);
        append_events(&log, 11, 0, 100);
        let facade = facade(log);
        observe(&facade, 4, 400);

        let first = facade.get_status().await;
        let second = facade.get_status().await;
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_within_timeout() {
        let log = SimulatedEventLog::with_faults(
            42,
            SimulatedLogFaultConfig::none().with_fetch_latency(Duration::from_secs(10)),
        );
        append_events(&log, 11, 0, 100);
        let facade = facade(log);

        // Nothing processed: answered without touching the slow oracle.
        let status = facade.get_status_within(Duration::from_millis(100)).await;
        assert_eq!(status, StatusSnapshot::caught_up());

        observe(&facade, 4, 400);
        let status = facade.get_status_within(Duration::from_millis(100)).await;
        assert_eq!(status, StatusSnapshot::indeterminate());
    }

    #[tokio::test]
    async fn test_log_batch_progress_returns_status() {
        let log = SimulatedEventLog::new(42);
        append_events(&log, 11, 0, 100);
        let facade = StatusFacade::new(
            CatchupConfig::for_testing().with_log_batch_progress(true),
            Arc::new(ConsumerObserver::new()),
            log,
        );
        facade.observer().set_state(ProcessorState::Running);
        observe(&facade, 5, 500);

        let status = facade.log_batch_progress(3).await;
        assert_eq!(status, StatusSnapshot::new(false, 50, Lag::Millis(500)));
    }

    #[test]
    fn test_batch_progress_line() {
        let status = StatusSnapshot::new(false, 42, Lag::Millis(1_500));
        let line = BatchProgress {
            batch_len: 25,
            processor: "orders-projection",
            status: &status,
        };
        assert_eq!(
            line.to_string(),
            "processing 25 messages [orders-projection], 42%, currently 1500 millis behind"
        );

        let status = StatusSnapshot::indeterminate();
        let line = BatchProgress {
            batch_len: 1,
            processor: "orders-projection",
            status: &status,
        };
        assert_eq!(
            line.to_string(),
            "processing 1 messages [orders-projection], 0%, currently unknown millis behind"
        );
    }

    #[test]
    fn test_facade_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StatusFacade<SimulatedEventLog>>();
        assert_send_sync::<StatusFacade<Arc<dyn HeadOracle>>>();
    }
}
