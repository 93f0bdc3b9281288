use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the conversion pipeline.
///
/// Startup errors (`Watch`, `Io` from the scan, `ScanOverflow`) and runtime
/// feed failures (`FeedClosed`, a `Watch` surfaced by the feed) are fatal to
/// the process; everything else is terminal to a single job only.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("startup scan found {found} eligible files but the job queue holds {capacity}")]
    ScanOverflow { found: usize, capacity: usize },

    #[error("change feed closed unexpectedly")]
    FeedClosed,

    #[error("job queue closed")]
    QueueClosed,

    #[error("source path is not absolute: {}", .0.display())]
    NotAbsolute(PathBuf),

    #[error("source path has no file name: {}", .0.display())]
    NoFileName(PathBuf),

    #[error("transcoder failed: {0}")]
    Transcode(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PipelineError>;
