//! Conversion worker: drains the job queue, invokes the external
//! transcoder, and rolls back partial output on failure.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, Result};
use crate::pages;
use crate::queue::ConversionJob;

/// Fixed playlist name inside each destination directory. Its presence is
/// the marker that a conversion completed.
pub const PLAYLIST_NAME: &str = "video.m3u8";
/// printf-style segment naming pattern handed to the transcoder.
pub const SEGMENT_PATTERN: &str = "video%03d.ts";
/// Segment length in seconds.
const SEGMENT_SECONDS: u32 = 6;

/// Outcome of one conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// The transcoder ran and the rendition is complete.
    Completed,
    /// The playlist already existed; nothing was invoked.
    Skipped,
}

/// External transcoding service boundary.
///
/// The production implementation shells out to ffmpeg; tests substitute
/// recording or failing implementations.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `source` into a playlist at `playlist` with segments named
    /// after `segment_pattern`. Success or failure only; no progress.
    async fn transcode(
        &self,
        source: &Path,
        playlist: &Path,
        segment_pattern: &Path,
    ) -> Result<()>;
}

/// Invokes `ffmpeg` to remux a source file into a VOD HLS rendition.
///
/// Streams are copied, not re-encoded; the work is segmenting.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    /// Transcoder resolving `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }

    /// Transcoder using an explicit ffmpeg binary.
    pub fn with_ffmpeg_path(path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: path.into(),
        }
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        source: &Path,
        playlist: &Path,
        segment_pattern: &Path,
    ) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(source)
            .args(["-c:v", "copy"])
            .args(["-c:a", "copy"])
            .args(["-f", "hls"])
            .arg("-hls_time")
            .arg(SEGMENT_SECONDS.to_string())
            .args(["-hls_list_size", "0"])
            .args(["-hls_playlist_type", "vod"])
            .arg("-hls_segment_filename")
            .arg(segment_pattern)
            .args(["-hls_segment_type", "fmp4"])
            .arg(playlist)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().take(10).collect::<Vec<_>>().join("\n");
            return Err(PipelineError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                output.status, detail
            )));
        }

        Ok(())
    }
}

/// Single consumer of the job queue.
///
/// Owns the destination directory of whichever path it is currently
/// converting; the playlist-exists check keeps a redundant trigger for an
/// already-finished path from touching that directory again.
pub struct ConversionWorker {
    dst_dir: PathBuf,
    transcoder: Arc<dyn Transcoder>,
}

impl fmt::Debug for ConversionWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionWorker")
            .field("dst_dir", &self.dst_dir)
            .finish_non_exhaustive()
    }
}

impl ConversionWorker {
    /// Worker writing renditions under `dst_dir`.
    pub fn new(dst_dir: PathBuf, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            dst_dir,
            transcoder,
        }
    }

    /// Drain `rx` until cancellation or channel closure.
    ///
    /// Per-job failures are logged and the loop continues; nothing a single
    /// job does can take the worker down.
    pub async fn run(self, mut rx: mpsc::Receiver<ConversionJob>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("conversion worker shutting down");
                    break;
                }
                job = rx.recv() => {
                    let Some(job) = job else {
                        info!("job queue closed, conversion worker exiting");
                        break;
                    };
                    let queued = Utc::now().signed_duration_since(job.enqueued_at);
                    debug!(
                        source = %job.source.display(),
                        queued_ms = queued.num_milliseconds(),
                        "job dequeued"
                    );
                    if let Err(err) = self.convert(&job.source).await {
                        error!(source = %job.source.display(), error = %err, "conversion failed");
                    }
                }
            }
        }
    }

    /// Convert one source file into `dst/<file stem>/`.
    pub async fn convert(&self, source: &Path) -> Result<ConversionOutcome> {
        info!(source = %source.display(), "conversion target");

        // Producers hand over absolute paths; anything else is an internal
        // defect, not an operator error.
        if !source.is_absolute() {
            return Err(PipelineError::NotAbsolute(source.to_path_buf()));
        }
        let Some(stem) = source.file_stem() else {
            return Err(PipelineError::NoFileName(source.to_path_buf()));
        };

        let dest_dir = self.dst_dir.join(stem);
        let playlist = dest_dir.join(PLAYLIST_NAME);
        let segments = dest_dir.join(SEGMENT_PATTERN);

        if tokio::fs::try_exists(&playlist).await.unwrap_or(false) {
            info!(playlist = %playlist.display(), "rendition already complete, skipping");
            return Ok(ConversionOutcome::Skipped);
        }

        tokio::fs::create_dir_all(&dest_dir).await?;

        info!(source = %source.display(), playlist = %playlist.display(), "conversion starting");
        if let Err(err) = self.transcoder.transcode(source, &playlist, &segments).await {
            self.rollback(&dest_dir).await;
            return Err(err);
        }

        // Destination-directory artifacts follow the same rollback policy as
        // the rendition itself.
        if let Err(err) = pages::write_title_page(&dest_dir, &stem.to_string_lossy()).await {
            self.rollback(&dest_dir).await;
            return Err(err);
        }

        info!(source = %source.display(), playlist = %playlist.display(), "conversion complete");

        if let Err(err) = pages::rebuild_index(&self.dst_dir).await {
            warn!(error = %err, "index rebuild failed, next completed conversion retries it");
        }

        Ok(ConversionOutcome::Completed)
    }

    async fn rollback(&self, dest_dir: &Path) {
        if let Err(err) = tokio::fs::remove_dir_all(dest_dir).await {
            warn!(dir = %dest_dir.display(), error = %err, "destination rollback failed");
        }
    }
}
