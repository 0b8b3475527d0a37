//! Simulated event log for deterministic testing.
//!
//! `SimulatedEventLog` is an in-memory, index-ordered log that behaves like a
//! storage engine fed by a sequence allocator: indexes can be reserved and
//! committed later (or never), so readers see gaps. It implements
//! [`HeadOracle`] and supports deterministic fault injection in the style of
//! the simulated progress store.

#![allow(clippy::significant_drop_tightening)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use helix_core::{Position, Timestamp};

use crate::error::{CatchupError, CatchupResult};
use crate::oracle::HeadOracle;
use crate::types::{HeadState, TrackedEvent};

// -----------------------------------------------------------------------------
// Fault Configuration
// -----------------------------------------------------------------------------

/// Fault configuration for the simulated event log.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLogFaultConfig {
    /// Probability of a head fetch failing (0.0 - 1.0).
    pub unavailable_rate: f64,
    /// Force next head fetch to fail (one-shot).
    pub force_unavailable: bool,
    /// Delay applied to every head fetch.
    pub fetch_latency: Option<Duration>,
}

impl SimulatedLogFaultConfig {
    /// No faults (all operations succeed immediately).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            unavailable_rate: 0.0,
            force_unavailable: false,
            fetch_latency: None,
        }
    }

    /// Flaky configuration for stress testing.
    #[must_use]
    pub const fn flaky() -> Self {
        Self {
            unavailable_rate: 0.05,
            force_unavailable: false,
            fetch_latency: None,
        }
    }

    /// Builder: set head fetch failure rate.
    #[must_use]
    pub const fn with_unavailable_rate(mut self, rate: f64) -> Self {
        self.unavailable_rate = rate;
        self
    }

    /// Builder: set head fetch latency.
    #[must_use]
    pub const fn with_fetch_latency(mut self, latency: Duration) -> Self {
        self.fetch_latency = Some(latency);
        self
    }
}

// -----------------------------------------------------------------------------
// Simulated Event Log
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct StoredEvent {
    timestamp: Timestamp,
    payload: Bytes,
}

#[derive(Debug, Default)]
struct LogInner {
    /// Committed events by index.
    events: BTreeMap<u64, StoredEvent>,
    /// Indexes handed out but not committed yet.
    reserved: BTreeSet<u64>,
    /// Next index the allocator hands out.
    next_index: u64,
}

/// In-memory event log with deterministic fault injection.
///
/// Clones share state via `Arc` for multi-handle testing.
#[derive(Debug, Clone)]
pub struct SimulatedEventLog {
    /// Log contents.
    inner: Arc<Mutex<LogInner>>,
    /// Fault configuration.
    fault_config: Arc<Mutex<SimulatedLogFaultConfig>>,
    /// RNG seed for deterministic faults.
    seed: u64,
    /// Operation counter for deterministic RNG.
    counter: Arc<AtomicU64>,
}

impl SimulatedEventLog {
    /// Creates an empty log with no faults.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_faults(seed, SimulatedLogFaultConfig::none())
    }

    /// Creates an empty log with fault injection.
    #[must_use]
    pub fn with_faults(seed: u64, config: SimulatedLogFaultConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogInner::default())),
            fault_config: Arc::new(Mutex::new(config)),
            seed,
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns fault config for modification.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn fault_config(&self) -> std::sync::MutexGuard<'_, SimulatedLogFaultConfig> {
        self.fault_config.lock().expect("fault config lock poisoned")
    }

    /// Deterministic RNG: `(seed + counter) * M`, normalized to `[0, 1]`.
    fn should_inject_fault(&self, rate: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let hash = self
            .seed
            .wrapping_add(counter)
            .wrapping_mul(0x9e37_79b9_7f4a_7c15);
        #[allow(clippy::cast_precision_loss)]
        let normalized = (hash as f64) / (u64::MAX as f64);
        normalized < rate
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogInner> {
        self.inner.lock().expect("log lock poisoned")
    }

    /// Appends an event at the next index and returns that index.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn append(&self, timestamp: Timestamp, payload: impl Into<Bytes>) -> u64 {
        let mut inner = self.lock();
        let index = inner.next_index;
        inner.next_index += 1;
        inner.events.insert(
            index,
            StoredEvent {
                timestamp,
                payload: payload.into(),
            },
        );
        index
    }

    /// Allocates an index whose event commits later, leaving a gap until then.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn reserve(&self) -> u64 {
        let mut inner = self.lock();
        let index = inner.next_index;
        inner.next_index += 1;
        inner.reserved.insert(index);
        index
    }

    /// Commits the event for a reserved index.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `index` is not reserved.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn commit_reserved(
        &self,
        index: u64,
        timestamp: Timestamp,
        payload: impl Into<Bytes>,
    ) -> CatchupResult<()> {
        let mut inner = self.lock();
        if !inner.reserved.remove(&index) {
            return Err(helix_core::Error::InvalidArgument {
                name: "index",
                reason: "not reserved",
            }
            .into());
        }
        inner.events.insert(
            index,
            StoredEvent {
                timestamp,
                payload: payload.into(),
            },
        );
        Ok(())
    }

    /// Drops a reservation; its index stays a permanent gap.
    ///
    /// Returns true if the index was reserved.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn abandon_reserved(&self, index: u64) -> bool {
        self.lock().reserved.remove(&index)
    }

    /// Returns the number of committed events.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    /// Returns true if no event has been committed.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// Reads up to `max_events` events a reader at `after` has not seen.
    ///
    /// Events that fill one of the reader's gaps come first, then events above
    /// its index, each in index order. Every returned event carries the
    /// reader's position as of that event. A reader with no position starts
    /// at the beginning of the log.
    ///
    /// # Errors
    ///
    /// Returns a `Core` error if a position cannot advance, which indicates a
    /// corrupted reader position.
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned or `max_events` is zero.
    pub fn read_batch(
        &self,
        after: Option<&Position>,
        max_events: usize,
        max_gap_offset: u64,
    ) -> CatchupResult<Vec<TrackedEvent>> {
        // TigerStyle: Assert preconditions.
        assert!(max_events > 0, "max_events must be positive");

        let inner = self.lock();
        let candidates: Vec<u64> = match after {
            None => inner.events.keys().take(max_events).copied().collect(),
            Some(position) => position
                .gaps()
                .iter()
                .filter(|gap| inner.events.contains_key(gap))
                .chain(
                    inner
                        .events
                        .range(position.index().saturating_add(1)..)
                        .map(|(index, _)| *index),
                )
                .take(max_events)
                .collect(),
        };

        let mut batch = Vec::with_capacity(candidates.len());
        let mut current = after.cloned();
        for index in candidates {
            let next = match &current {
                None => Position::first_seen(index, max_gap_offset),
                Some(position) => position.advance_to(index, max_gap_offset)?,
            };
            if let Some(event) = inner.events.get(&index) {
                batch.push(TrackedEvent::new(
                    next.clone(),
                    event.timestamp,
                    event.payload.clone(),
                ));
            }
            current = Some(next);
        }

        // TigerStyle: Assert postconditions.
        assert!(batch.len() <= max_events);
        Ok(batch)
    }

    /// Returns the newest committed index and its timestamp (bypasses faults).
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    #[must_use]
    pub fn newest(&self) -> Option<(u64, Timestamp)> {
        self.lock()
            .events
            .last_key_value()
            .map(|(index, event)| (*index, event.timestamp))
    }
}

#[async_trait]
impl HeadOracle for SimulatedEventLog {
    async fn fetch_head(&self) -> CatchupResult<HeadState> {
        // Check for forced failure.
        let latency = {
            let mut config = self.fault_config.lock().expect("lock poisoned");
            if config.force_unavailable {
                config.force_unavailable = false;
                return Err(CatchupError::unreachable(
                    "fetch_head",
                    "simulated failure (forced)",
                ));
            }
            config.fetch_latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        // Check for probabilistic failure.
        let unavailable_rate = self.fault_config.lock().expect("lock").unavailable_rate;
        if self.should_inject_fault(unavailable_rate) {
            return Err(CatchupError::unreachable(
                "fetch_head",
                "simulated failure (random)",
            ));
        }

        let (index, timestamp) = self.newest().ok_or_else(CatchupError::empty_log)?;
        Ok(HeadState::new(Position::new(index), timestamp))
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnavailableCause;

    const MAX_GAP: u64 = 1_000;

    fn ts(millis: i64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[tokio::test]
    async fn test_empty_log_head() {
        let log = SimulatedEventLog::new(42);

        let err = log.fetch_head().await.unwrap_err();
        assert!(err.is_empty_log());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_head_tracks_newest_event() {
        let log = SimulatedEventLog::new(42);
        log.append(ts(100), "a");
        log.append(ts(200), "b");

        let head = log.fetch_head().await.unwrap();
        assert_eq!(head.head_position.index(), 1);
        assert_eq!(head.head_event_timestamp, ts(200));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_read_from_start() {
        let log = SimulatedEventLog::new(42);
        for i in 0..5 {
            log.append(ts(i), "e");
        }

        let batch = log.read_batch(None, 3, MAX_GAP).unwrap();
        let indexes: Vec<u64> = batch.iter().map(TrackedEvent::position_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(batch.iter().all(|e| !e.position.has_gaps()));

        let rest = log
            .read_batch(Some(&batch[2].position), 10, MAX_GAP)
            .unwrap();
        let indexes: Vec<u64> = rest.iter().map(TrackedEvent::position_index).collect();
        assert_eq!(indexes, vec![3, 4]);
    }

    #[test]
    fn test_reserved_index_becomes_gap_then_fills() {
        let log = SimulatedEventLog::new(42);
        log.append(ts(0), "a");
        let pending = log.reserve();
        log.append(ts(2), "c");

        let batch = log.read_batch(None, 10, MAX_GAP).unwrap();
        assert_eq!(batch.len(), 2);
        let position = batch[1].position.clone();
        assert_eq!(position.index(), 2);
        assert!(position.gaps().contains(pending));

        log.commit_reserved(pending, ts(1), "b").unwrap();
        let batch = log.read_batch(Some(&position), 10, MAX_GAP).unwrap();
        assert_eq!(batch.len(), 1);
        // The fill at the reserved index reports the reader still at 2.
        assert_eq!(batch[0].position_index(), 2);
        assert!(batch[0].position.covers(pending));
        assert!(!batch[0].position.has_gaps());
    }

    #[test]
    fn test_commit_unreserved_index_fails() {
        let log = SimulatedEventLog::new(42);
        log.append(ts(0), "a");

        let err = log.commit_reserved(0, ts(1), "b").unwrap_err();
        assert!(matches!(err, CatchupError::Core(_)));
    }

    #[test]
    fn test_abandoned_reservation_is_trimmed() {
        let log = SimulatedEventLog::new(42);
        let pending = log.reserve();
        assert!(log.abandon_reserved(pending));
        assert!(!log.abandon_reserved(pending));

        for i in 0..5 {
            log.append(ts(i), "e");
        }

        // A gap window of 2 gives up on index 0 once the reader is at 5.
        let batch = log.read_batch(None, 10, 2).unwrap();
        let last = batch.last().unwrap();
        assert_eq!(last.position_index(), 5);
        assert!(!last.position.has_gaps());
    }

    #[tokio::test]
    async fn test_forced_failure() {
        let log = SimulatedEventLog::new(42);
        log.append(ts(0), "a");

        log.fault_config().force_unavailable = true;
        let err = log.fetch_head().await.unwrap_err();
        assert!(matches!(
            err,
            CatchupError::UpstreamUnavailable {
                cause: UnavailableCause::Unreachable { .. }
            }
        ));

        // One-shot.
        assert!(log.fetch_head().await.is_ok());
    }

    #[tokio::test]
    async fn test_probabilistic_failure() {
        let log = SimulatedEventLog::with_faults(
            42,
            SimulatedLogFaultConfig::none().with_unavailable_rate(1.0),
        );
        log.append(ts(0), "a");

        for _ in 0..10 {
            assert!(log.fetch_head().await.is_err());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_latency() {
        let log = SimulatedEventLog::with_faults(
            42,
            SimulatedLogFaultConfig::none().with_fetch_latency(Duration::from_secs(5)),
        );
        log.append(ts(0), "a");

        let result =
            tokio::time::timeout(Duration::from_secs(1), log.fetch_head()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let log1 = SimulatedEventLog::new(42);
        let log2 = log1.clone();

        log1.append(ts(10), "a");
        let head = log2.fetch_head().await.unwrap();
        assert_eq!(head.head_position.index(), 0);
    }
}
