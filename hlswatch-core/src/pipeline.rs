//! Wires the change feed, debounce table, sweeper, and worker together.
//!
//! Three tasks share one cancellation token: the feed task classifies raw
//! notifications into debounce transitions, the sweeper converts settled
//! paths into queued jobs, and the worker drains the queue. The only fatal
//! runtime condition is the change feed failing or closing; per-job errors
//! never cross the task boundary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::debounce::DebounceTable;
use crate::error::{PipelineError, Result};
use crate::feed::{self, ChangeFeed, FeedMessage};
use crate::filter::is_media_source;
use crate::queue::{self, DEFAULT_JOB_CAPACITY, JobQueue};
use crate::worker::{ConversionWorker, Transcoder};

/// Interval between expiry sweeps. One wakeup per tick regardless of the
/// number of tracked paths, at the cost of up to one interval of added
/// trigger latency.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Pipeline wiring parameters.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Watched drop directory. Must be absolute; the worker rejects jobs
    /// whose paths are not.
    pub source_dir: PathBuf,
    /// Root of the rendition tree.
    pub dest_dir: PathBuf,
    /// Job queue capacity; also the hard cap on the startup backlog.
    pub job_capacity: usize,
    /// Tick interval of the expiry sweeper.
    pub sweep_interval: Duration,
}

impl PipelineConfig {
    /// Configuration with default capacity and sweep cadence.
    pub fn new(source_dir: PathBuf, dest_dir: PathBuf) -> Self {
        Self {
            source_dir,
            dest_dir,
            job_capacity: DEFAULT_JOB_CAPACITY,
            sweep_interval: SWEEP_INTERVAL,
        }
    }
}

/// Running pipeline: its tasks plus the process-wide cancellation token.
#[derive(Debug)]
pub struct PipelineHandle {
    shutdown: CancellationToken,
    fatal_rx: mpsc::Receiver<PipelineError>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Clone of the process-wide cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait for the first fatal pipeline error.
    pub async fn wait_fatal(&mut self) -> PipelineError {
        match self.fatal_rx.recv().await {
            Some(err) => err,
            // Every task dropped its sender without reporting; only
            // reachable once shutdown is already underway.
            None => PipelineError::FeedClosed,
        }
    }

    /// Cancel every task and wait for them to finish. An in-flight
    /// transcoder invocation runs to completion first; nothing is rolled
    /// back by cancellation itself.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(err) = task.await
                && !err.is_cancelled()
            {
                warn!(error = %err, "pipeline task panicked during shutdown");
            }
        }
    }
}

/// Start the full pipeline against the real filesystem watcher.
pub async fn start(
    config: PipelineConfig,
    transcoder: Arc<dyn Transcoder>,
) -> Result<PipelineHandle> {
    let feed = ChangeFeed::watch(&config.source_dir)?;
    start_with_feed(config, feed, transcoder).await
}

/// Start the pipeline over an externally supplied feed.
///
/// Production passes the notify-backed feed from [`start`]; tests pass a
/// scripted channel feed.
pub async fn start_with_feed(
    config: PipelineConfig,
    feed: ChangeFeed,
    transcoder: Arc<dyn Transcoder>,
) -> Result<PipelineHandle> {
    let backlog = feed::scan_existing(&config.source_dir)?;
    info!(
        count = backlog.len(),
        source = %config.source_dir.display(),
        "startup scan finished"
    );

    let (jobs, job_rx) = queue::job_channel(config.job_capacity);
    jobs.seed(backlog).await?;

    let table = Arc::new(DebounceTable::new());
    let shutdown = CancellationToken::new();
    let (fatal_tx, fatal_rx) = mpsc::channel(1);

    let tasks = vec![
        spawn_feed_task(feed, Arc::clone(&table), fatal_tx, shutdown.clone()),
        spawn_sweep_task(table, jobs, config.sweep_interval, shutdown.clone()),
        tokio::spawn(
            ConversionWorker::new(config.dest_dir.clone(), transcoder)
                .run(job_rx, shutdown.clone()),
        ),
    ];

    Ok(PipelineHandle {
        shutdown,
        fatal_rx,
        tasks,
    })
}

fn spawn_feed_task(
    mut feed: ChangeFeed,
    table: Arc<DebounceTable>,
    fatal_tx: mpsc::Sender<PipelineError>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("change feed task shutting down");
                    break;
                }
                msg = feed.next() => match msg {
                    Some(FeedMessage::Event(event)) => {
                        if is_media_source(&event.path) {
                            table.apply(&event);
                        } else {
                            debug!(path = %event.path.display(), "ignoring non-media path");
                        }
                    }
                    Some(FeedMessage::Error(message)) => {
                        error!(error = %message, "change feed reported an error");
                        let _ = fatal_tx
                            .send(PipelineError::Watch(notify::Error::generic(&message)))
                            .await;
                        break;
                    }
                    None => {
                        let _ = fatal_tx.send(PipelineError::FeedClosed).await;
                        break;
                    }
                }
            }
        }
    })
}

fn spawn_sweep_task(
    table: Arc<DebounceTable>,
    jobs: JobQueue,
    sweep_interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("expiry sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let settled = table.sweep_expired();
                    if !settled.is_empty() {
                        debug!(
                            settled = settled.len(),
                            tracked = table.len(),
                            "sweep produced conversion candidates"
                        );
                    }
                    for path in settled {
                        // Eligibility re-check before the handoff.
                        if !is_media_source(&path) {
                            warn!(path = %path.display(), "settled path no longer eligible, dropping");
                            continue;
                        }
                        tokio::select! {
                            _ = shutdown.cancelled() => return,
                            pushed = jobs.push(path) => {
                                if pushed.is_err() {
                                    warn!("job queue closed, expiry sweeper exiting");
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}
