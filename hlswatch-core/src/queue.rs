//! Bounded handoff of conversion jobs from producers to the worker.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::{PipelineError, Result};

/// Number of jobs the queue holds before producers block.
pub const DEFAULT_JOB_CAPACITY: usize = 100;

/// One conversion request. Consumed exactly once by the worker; never
/// retried, never persisted.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// Absolute path of the source file.
    pub source: PathBuf,
    /// Wall-clock time the job entered the queue.
    pub enqueued_at: DateTime<Utc>,
}

impl ConversionJob {
    /// Job for `source`, stamped now.
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            enqueued_at: Utc::now(),
        }
    }
}

/// Producer half of the bounded job channel.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<ConversionJob>,
    capacity: usize,
}

/// Create the job channel; the receiver goes to the conversion worker.
pub fn job_channel(capacity: usize) -> (JobQueue, mpsc::Receiver<ConversionJob>) {
    let (tx, rx) = mpsc::channel(capacity);
    (JobQueue { tx, capacity }, rx)
}

impl JobQueue {
    /// Configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Startup producer: enqueue the catch-up scan results.
    ///
    /// All-or-nothing. If the scan found more eligible files than the queue
    /// holds, startup fails before a single job is enqueued; operators raise
    /// the capacity or drain the backlog instead of losing files silently.
    pub async fn seed(&self, paths: Vec<PathBuf>) -> Result<()> {
        if paths.len() > self.capacity {
            return Err(PipelineError::ScanOverflow {
                found: paths.len(),
                capacity: self.capacity,
            });
        }
        for path in paths {
            self.tx
                .send(ConversionJob::new(path))
                .await
                .map_err(|_| PipelineError::QueueClosed)?;
        }
        Ok(())
    }

    /// Runtime producer: enqueue one settled path, waiting for space when
    /// the worker is behind. Backpressure lands here, in the caller, never
    /// in dropped jobs.
    pub async fn push(&self, path: PathBuf) -> Result<()> {
        self.tx
            .send(ConversionJob::new(path))
            .await
            .map_err(|_| PipelineError::QueueClosed)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::job_channel;
    use crate::error::PipelineError;

    #[tokio::test]
    async fn seed_rejects_backlogs_beyond_capacity() {
        let (queue, mut rx) = job_channel(2);
        let backlog = vec![
            PathBuf::from("/media/in/a.mp4"),
            PathBuf::from("/media/in/b.mp4"),
            PathBuf::from("/media/in/c.mp4"),
        ];

        let err = queue.seed(backlog).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ScanOverflow {
                found: 3,
                capacity: 2,
            }
        ));
        // No partial enqueue.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn producers_drain_in_fifo_order() {
        let (queue, mut rx) = job_channel(4);
        queue
            .seed(vec![
                PathBuf::from("/media/in/a.mp4"),
                PathBuf::from("/media/in/b.mp4"),
            ])
            .await
            .unwrap();
        queue.push(PathBuf::from("/media/in/c.mp4")).await.unwrap();

        let order: Vec<_> = [rx.recv().await, rx.recv().await, rx.recv().await]
            .into_iter()
            .map(|job| job.unwrap().source)
            .collect();
        assert_eq!(
            order,
            vec![
                PathBuf::from("/media/in/a.mp4"),
                PathBuf::from("/media/in/b.mp4"),
                PathBuf::from("/media/in/c.mp4"),
            ]
        );
    }

    #[tokio::test]
    async fn push_fails_once_the_worker_is_gone() {
        let (queue, rx) = job_channel(1);
        drop(rx);
        let err = queue.push(PathBuf::from("/media/in/a.mp4")).await.unwrap_err();
        assert!(matches!(err, PipelineError::QueueClosed));
    }
}
