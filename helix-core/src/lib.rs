//! Helix Core - Strongly-typed identifiers and log positions for Helix.
//!
//! This crate provides the value types shared by the catch-up tracking
//! crates: gap-aware log positions, event timestamps and identifiers.
//!
//! # Design Principles (TigerStyle)
//!
//! - **Strongly-typed IDs**: Prevent mixing up a `SegmentId` with a log index
//! - **Explicit types**: Use u64/i64, not usize
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod position;
mod timestamp;
mod types;

pub use error::{Error, Result};
pub use position::Position;
pub use timestamp::Timestamp;
pub use types::SegmentId;
