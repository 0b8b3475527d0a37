//! Core catch-up tracking data structures.

use std::fmt;

use bytes::Bytes;
use helix_core::{Position, Timestamp};

// -----------------------------------------------------------------------------
// Tracked Event
// -----------------------------------------------------------------------------

/// An event as delivered to a tracking consumer.
///
/// `position` is the reader's gap-aware position *after* this event, so a
/// consumer that stops here can resume from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEvent {
    /// Reader position including this event.
    pub position: Position,
    /// Wall-clock time the event was stored.
    pub timestamp: Timestamp,
    /// Opaque event payload.
    pub payload: Bytes,
}

impl TrackedEvent {
    /// Creates a new tracked event.
    #[must_use]
    pub fn new(position: Position, timestamp: Timestamp, payload: impl Into<Bytes>) -> Self {
        Self {
            position,
            timestamp,
            payload: payload.into(),
        }
    }

    /// Returns the index of the reader position after this event.
    ///
    /// This is the highest index the reader has seen, not the event's own
    /// index: an event filling a gap reports the index already reached.
    #[must_use]
    pub const fn position_index(&self) -> u64 {
        self.position.index()
    }
}

// -----------------------------------------------------------------------------
// Consumer State
// -----------------------------------------------------------------------------

/// What a consumer has processed, as last published by its observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerState {
    /// Position of the oldest event of the last processed batch.
    pub last_position: Position,
    /// Timestamp of that same event.
    pub last_event_timestamp: Timestamp,
}

impl ConsumerState {
    /// Creates a new consumer state.
    #[must_use]
    pub const fn new(last_position: Position, last_event_timestamp: Timestamp) -> Self {
        Self {
            last_position,
            last_event_timestamp,
        }
    }
}

// -----------------------------------------------------------------------------
// Head State
// -----------------------------------------------------------------------------

/// Newest position of the log and the timestamp of the event stored there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadState {
    /// Position of the newest event.
    pub head_position: Position,
    /// Timestamp of the newest event.
    pub head_event_timestamp: Timestamp,
}

impl HeadState {
    /// Creates a new head state.
    #[must_use]
    pub const fn new(head_position: Position, head_event_timestamp: Timestamp) -> Self {
        Self {
            head_position,
            head_event_timestamp,
        }
    }
}

// -----------------------------------------------------------------------------
// Lag
// -----------------------------------------------------------------------------

/// How far a consumer trails the head in wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lag {
    /// Known lag in milliseconds.
    Millis(u64),
    /// The head could not be read, so lag is indeterminate.
    Unknown,
}

impl Lag {
    /// Returns the lag in milliseconds, or `None` if unknown.
    #[must_use]
    pub const fn as_millis(self) -> Option<u64> {
        match self {
            Self::Millis(ms) => Some(ms),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for Lag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis(ms) => write!(f, "{ms}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

// -----------------------------------------------------------------------------
// Status Snapshot
// -----------------------------------------------------------------------------

/// Immutable catch-up status of a consumer at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusSnapshot {
    ready: bool,
    progress_percent: u8,
    lag: Lag,
}

impl StatusSnapshot {
    /// Creates a snapshot.
    ///
    /// # Panics
    ///
    /// Panics if `progress_percent > 100`.
    #[must_use]
    pub const fn new(ready: bool, progress_percent: u8, lag: Lag) -> Self {
        // TigerStyle: Assert preconditions.
        assert!(progress_percent <= 100, "progress_percent must be <= 100");
        Self {
            ready,
            progress_percent,
            lag,
        }
    }

    /// Snapshot of a consumer with nothing left to catch up on.
    #[must_use]
    pub const fn caught_up() -> Self {
        Self::new(true, 100, Lag::Millis(0))
    }

    /// Snapshot reported when the head of the log cannot be read.
    ///
    /// This means "unknown", not "fully behind".
    #[must_use]
    pub const fn indeterminate() -> Self {
        Self::new(false, 0, Lag::Unknown)
    }

    /// Returns true if the consumer has reached the head index.
    #[must_use]
    pub const fn ready(&self) -> bool {
        self.ready
    }

    /// Returns progress through the log as a truncated percentage.
    #[must_use]
    pub const fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    /// Returns the lag behind the head.
    #[must_use]
    pub const fn lag(&self) -> Lag {
        self.lag
    }

    /// Returns the lag in milliseconds, or `None` if unknown.
    #[must_use]
    pub const fn lag_ms(&self) -> Option<u64> {
        self.lag.as_millis()
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ready={} progress={}% lag={}",
            self.ready, self.progress_percent, self.lag
        )?;
        if let Lag::Millis(_) = self.lag {
            f.write_str("ms")?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Processor State
// -----------------------------------------------------------------------------

/// Lifecycle of the tracking consumer that feeds an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ProcessorState {
    /// Not processing; the initial and final state.
    #[default]
    Stopped = 0,
    /// Claiming segments and restoring positions.
    Starting = 1,
    /// Delivering batches.
    Running = 2,
    /// Draining in-flight work.
    Stopping = 3,
}

impl ProcessorState {
    /// Decodes a state stored with `as u8`.
    ///
    /// Unknown values decode as `Stopped`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

// -----------------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------------

/// Configuration for catch-up tracking of one processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchupConfig {
    /// Processor name used in log lines.
    pub processor_name: String,
    /// How far below the newest index gaps are kept before being given up on.
    pub max_gap_offset: u64,
    /// Emit the per-batch progress line.
    pub log_batch_progress: bool,
}

impl CatchupConfig {
    /// Default distance below the newest index at which gaps are dropped.
    pub const DEFAULT_MAX_GAP_OFFSET: u64 = 10_000;

    /// Creates a config for the named processor with default settings.
    #[must_use]
    pub fn new(processor_name: impl Into<String>) -> Self {
        Self {
            processor_name: processor_name.into(),
            max_gap_offset: Self::DEFAULT_MAX_GAP_OFFSET,
            log_batch_progress: true,
        }
    }

    /// Creates config for testing with small gap windows.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            processor_name: "test-processor".to_string(),
            max_gap_offset: 100,
            log_batch_progress: false,
        }
    }

    /// Builder: set the gap window.
    #[must_use]
    pub const fn with_max_gap_offset(mut self, max_gap_offset: u64) -> Self {
        self.max_gap_offset = max_gap_offset;
        self
    }

    /// Builder: toggle the per-batch progress line.
    #[must_use]
    pub const fn with_log_batch_progress(mut self, enabled: bool) -> Self {
        self.log_batch_progress = enabled;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the name is empty or the gap window is zero.
    pub fn validate(&self) -> helix_core::Result<()> {
        if self.processor_name.is_empty() {
            return Err(helix_core::Error::InvalidArgument {
                name: "processor_name",
                reason: "must not be empty",
            });
        }
        if self.max_gap_offset == 0 {
            return Err(helix_core::Error::InvalidArgument {
                name: "max_gap_offset",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

impl Default for CatchupConfig {
    fn default() -> Self {
        Self::new("tracking-processor")
    }
}
