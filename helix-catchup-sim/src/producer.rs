//! Simulated producer appending events to the log.
//!
//! Some appends go through a reserved index that commits a few events later,
//! the way concurrent transactions against a sequence allocator do, so
//! readers see gaps that fill in afterwards.

use std::time::Duration;

use helix_catchup::{CatchupResult, SimulatedEventLog};
use helix_core::Timestamp;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How many appends a late commit trails behind its reservation.
const LATE_COMMIT_DISTANCE: usize = 3;

/// Configuration for the simulated producer.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Number of events to append.
    pub events: u64,
    /// Pause between appends.
    pub interval: Duration,
    /// Probability that an append commits late (0.0 - 1.0).
    pub gap_rate: f64,
    /// RNG seed.
    pub seed: u64,
}

/// Deterministic RNG: `(seed + counter) * M`, normalized to `[0, 1]`.
#[allow(clippy::cast_precision_loss)]
fn roll(seed: u64, counter: u64) -> f64 {
    let hash = seed.wrapping_add(counter).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    (hash as f64) / (u64::MAX as f64)
}

/// Appends `config.events` events, then commits any reservations still open.
///
/// Returns the number of events committed.
///
/// # Errors
///
/// Returns an error if a reservation cannot be committed.
pub async fn produce(
    log: SimulatedEventLog,
    config: ProducerConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> CatchupResult<u64> {
    let mut interval = tokio::time::interval(config.interval);
    let mut pending: Vec<(u64, usize)> = Vec::new();
    let mut committed = 0u64;

    for n in 0..config.events {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Producer shutting down");
                break;
            }
            _ = interval.tick() => {}
        }

        if roll(config.seed, n) < config.gap_rate {
            let index = log.reserve();
            debug!(index, "Reserved index for late commit");
            pending.push((index, LATE_COMMIT_DISTANCE));
        } else {
            log.append(Timestamp::now(), format!("event-{n}"));
            committed += 1;
        }

        // Commit reservations whose distance has run out.
        let mut still_pending = Vec::with_capacity(pending.len());
        for (index, remaining) in pending.drain(..) {
            if remaining == 0 {
                log.commit_reserved(index, Timestamp::now(), format!("late-{index}"))?;
                committed += 1;
            } else {
                still_pending.push((index, remaining - 1));
            }
        }
        pending = still_pending;
    }

    for (index, _) in pending {
        log.commit_reserved(index, Timestamp::now(), format!("late-{index}"))?;
        committed += 1;
    }

    info!(committed, "Producer finished");
    Ok(committed)
}
