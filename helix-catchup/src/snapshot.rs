//! Progress and lag computation.
//!
//! [`compute_snapshot`] is a pure function of what the consumer last
//! published and what the storage engine reports as the head. The two are
//! read at different instants, so the consumer may appear ahead of the head;
//! that skew is clamped rather than reported.

use crate::error::CatchupResult;
use crate::types::{ConsumerState, HeadState, Lag, StatusSnapshot};

/// Computes the catch-up status of a consumer against the head of the log.
///
/// - No consumer state: the consumer has processed nothing and is reported
///   caught up.
/// - Empty log: nothing to catch up to, reported caught up.
/// - Any other head failure: indeterminate (`ready=false`, 0%, unknown lag).
/// - Otherwise `ready` compares indexes, progress is
///   `floor(consumer * 100 / head)` and lag is the head's event timestamp
///   minus the consumer's, never below zero.
#[must_use]
pub fn compute_snapshot(
    consumer: Option<&ConsumerState>,
    head: &CatchupResult<HeadState>,
) -> StatusSnapshot {
    let Some(consumer) = consumer else {
        return StatusSnapshot::caught_up();
    };

    let head = match head {
        Ok(head) => head,
        Err(err) if err.is_empty_log() => return StatusSnapshot::caught_up(),
        Err(_) => return StatusSnapshot::indeterminate(),
    };

    let consumer_index = consumer.last_position.index();
    let head_index = head.head_position.index();

    // `ready` is not `progress == 100`: truncation and the head-index-zero
    // case decouple the two.
    let ready = consumer_index >= head_index;
    let progress = progress_percent(consumer_index, head_index);
    let lag_ms = head
        .head_event_timestamp
        .millis_since(consumer.last_event_timestamp);

    StatusSnapshot::new(ready, progress, Lag::Millis(lag_ms))
}

/// Truncated percentage of `consumer_index` over `head_index`, within 0..=100.
fn progress_percent(consumer_index: u64, head_index: u64) -> u8 {
    if head_index == 0 {
        return 100;
    }
    let percent = u128::from(consumer_index) * 100 / u128::from(head_index);
    u8::try_from(percent.min(100)).unwrap_or(100)
}
