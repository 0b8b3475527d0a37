//! Helix catch-up simulation binary.
//!
//! Runs a producer appending to an in-memory event log, a tracking processor
//! consuming it, and a reporter logging the processor's catch-up status:
//!
//! ```bash
//! helix-catchup-sim --events 5000 --batch-size 50 --gap-rate 0.05
//! ```
//!
//! Exits once production has finished and the processor reports ready.
//! Pass `--fault-rate` to make head fetches fail and watch the status
//! degrade to indeterminate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod processor;
mod producer;
mod reporter;
mod tokens;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use helix_catchup::{
    CatchupConfig, ConsumerObserver, SimulatedEventLog, SimulatedLogFaultConfig, StatusFacade,
};
use helix_core::SegmentId;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::processor::{ProcessorConfig, TrackingProcessor};
use crate::producer::{produce, ProducerConfig};
use crate::reporter::{report_status, ReportingHook};
use crate::tokens::MemoryTokenStore;

/// Simulated tracking consumer with catch-up status reporting.
#[derive(Parser, Debug)]
#[command(name = "helix-catchup-sim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Processor name used in log lines and as token key.
    #[arg(long, default_value = "sim-projection")]
    name: String,

    /// Number of events the producer appends.
    #[arg(long, default_value = "2000")]
    events: u64,

    /// Pause between appends, in milliseconds.
    #[arg(long, default_value = "1")]
    produce_interval_ms: u64,

    /// Probability that an append commits late, leaving a gap (0.0 - 1.0).
    #[arg(long, default_value = "0.02")]
    gap_rate: f64,

    /// Maximum events per processed batch.
    #[arg(long, default_value = "25")]
    batch_size: usize,

    /// Pause between processor polls, in milliseconds.
    #[arg(long, default_value = "5")]
    poll_interval_ms: u64,

    /// Distance below the newest index at which gaps are given up on.
    #[arg(long, default_value_t = CatchupConfig::DEFAULT_MAX_GAP_OFFSET)]
    max_gap_offset: u64,

    /// Interval between status reports, in milliseconds.
    #[arg(long, default_value = "250")]
    status_interval_ms: u64,

    /// How long a status report waits on the head fetch, in milliseconds.
    #[arg(long, default_value = "100")]
    status_timeout_ms: u64,

    /// Probability that a head fetch fails (0.0 - 1.0).
    #[arg(long, default_value = "0.0")]
    fault_rate: f64,

    /// Log the progress line after every batch.
    #[arg(long)]
    log_batches: bool,

    /// RNG seed for gaps and faults.
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = CatchupConfig::new(args.name.clone())
        .with_max_gap_offset(args.max_gap_offset)
        .with_log_batch_progress(args.log_batches);
    config.validate()?;

    info!(
        processor = %config.processor_name,
        events = args.events,
        batch_size = args.batch_size,
        gap_rate = args.gap_rate,
        fault_rate = args.fault_rate,
        seed = args.seed,
        "Starting catch-up simulation"
    );

    let log = SimulatedEventLog::with_faults(
        args.seed,
        SimulatedLogFaultConfig::none().with_unavailable_rate(args.fault_rate),
    );
    let observer = Arc::new(ConsumerObserver::new());
    let facade = Arc::new(StatusFacade::new(config.clone(), observer, log.clone()));

    let (producer_shutdown_tx, producer_shutdown_rx) = mpsc::channel(1);
    let (processor_shutdown_tx, processor_shutdown_rx) = mpsc::channel(1);
    let (reporter_shutdown_tx, reporter_shutdown_rx) = mpsc::channel(1);
    let (caught_up_tx, mut caught_up_rx) = mpsc::channel(1);
    let production_done = Arc::new(AtomicBool::new(false));

    let producer = tokio::spawn(produce(
        log.clone(),
        ProducerConfig {
            events: args.events,
            interval: Duration::from_millis(args.produce_interval_ms.max(1)),
            gap_rate: args.gap_rate,
            seed: args.seed,
        },
        producer_shutdown_rx,
    ));

    let processor = TrackingProcessor::new(
        ProcessorConfig {
            name: config.processor_name.clone(),
            segment: SegmentId::new(0),
            batch_size: args.batch_size.max(1),
            max_gap_offset: config.max_gap_offset,
            poll_interval: Duration::from_millis(args.poll_interval_ms.max(1)),
            reset_on_start: false,
        },
        log,
        MemoryTokenStore::new(),
        ReportingHook::new(Arc::clone(&facade), Handle::current()),
    );
    let processor = tokio::spawn(processor.run(processor_shutdown_rx));

    let reporter = tokio::spawn(report_status(
        Arc::clone(&facade),
        Duration::from_millis(args.status_interval_ms.max(1)),
        Duration::from_millis(args.status_timeout_ms.max(1)),
        Arc::clone(&production_done),
        caught_up_tx,
        reporter_shutdown_rx,
    ));

    let committed = tokio::select! {
        result = producer => result??,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping producer");
            let _ = producer_shutdown_tx.send(()).await;
            0
        }
    };
    production_done.store(true, Ordering::Release);

    tokio::select! {
        status = caught_up_rx.recv() => {
            if let Some(status) = status {
                info!(committed, %status, "Processor caught up");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted before catching up");
        }
    }

    let _ = processor_shutdown_tx.send(()).await;
    let handled = processor.await??;
    let _ = reporter_shutdown_tx.send(()).await;
    reporter.await?;

    let status = facade.get_status().await;
    info!(handled, %status, "Simulation finished");
    Ok(())
}
