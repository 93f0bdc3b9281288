//! Core pipeline for hlswatch.
//!
//! Converts a noisy, bursty stream of filesystem notifications into a clean,
//! at-most-once stream of HLS conversion jobs:
//!
//! ```text
//! change feed -> debounce table <-> expiry sweeper -> job queue -> worker -> ffmpeg
//! ```
//!
//! A path becomes a job only after its quiet period elapses with no further
//! writes; renames and removals cancel the pending trigger; a completed
//! rendition (playlist present) is never converted twice.

pub mod debounce;
pub mod error;
pub mod feed;
pub mod filter;
pub mod pages;
pub mod pipeline;
pub mod queue;
pub mod worker;

pub use error::{PipelineError, Result};
pub use pipeline::{PipelineConfig, PipelineHandle};
