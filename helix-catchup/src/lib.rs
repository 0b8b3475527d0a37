//! Catch-up progress tracking for Helix tracking consumers.
//!
//! This crate answers three questions about a consumer that reads an ordered,
//! possibly gap-containing event log and applies it to a projection:
//!
//! - Has it caught up to the head of the log?
//! - What percentage of the log has it processed?
//! - How far behind, in wall-clock time, is it?
//!
//! # Overview
//!
//! - **[`ConsumerObserver`]**: a [`BatchHook`] the consumer's processing loop
//!   calls after each committed batch. It publishes the first event's
//!   position and timestamp with a single atomic swap.
//! - **[`HeadOracle`]**: asks the storage engine for the newest position and
//!   the timestamp of its event.
//! - **[`compute_snapshot`]**: the pure progress/lag computation.
//! - **[`StatusFacade`]**: the query surface combining the three. It never
//!   fails; an unreachable storage engine yields an indeterminate snapshot.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use helix_catchup::{CatchupConfig, ConsumerObserver, SimulatedEventLog, StatusFacade};
//!
//! let log = SimulatedEventLog::new(42);
//! let observer = Arc::new(ConsumerObserver::new());
//!
//! // Hand `observer.clone()` to the processing loop as its batch hook. It
//! // records batches as soon as they arrive; lifecycle calls are optional
//! // and only stop recording once the consumer reports it has stopped.
//! let facade = StatusFacade::new(CatchupConfig::new("orders-projection"), observer, log);
//!
//! let status = facade.get_status().await;
//! println!("{status}");
//! ```
//!
//! # Testing
//!
//! The [`SimulatedEventLog`] provides deterministic fault injection:
//!
//! ```ignore
//! use helix_catchup::{SimulatedEventLog, SimulatedLogFaultConfig};
//!
//! let log = SimulatedEventLog::with_faults(seed, SimulatedLogFaultConfig::flaky());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Allow these for cleaner code in this crate.
#![allow(clippy::module_name_repetitions)]

mod error;
mod event_log;
mod facade;
mod observer;
mod oracle;
mod snapshot;
mod types;

// Re-export public API.
pub use error::{CatchupError, CatchupResult, UnavailableCause};
pub use event_log::{SimulatedEventLog, SimulatedLogFaultConfig};
pub use facade::StatusFacade;
pub use observer::{BatchHook, ConsumerObserver};
pub use oracle::HeadOracle;
pub use snapshot::compute_snapshot;
pub use types::{
    CatchupConfig, ConsumerState, HeadState, Lag, ProcessorState, StatusSnapshot, TrackedEvent,
};
