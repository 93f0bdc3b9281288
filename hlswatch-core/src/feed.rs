//! Filesystem change feed.
//!
//! A thin wrapper around `notify` that forwards raw notifications into an
//! async channel, plus the one-time enumeration of files already present
//! when watching starts. Watch-setup failures are fatal; runtime errors are
//! forwarded as [`FeedMessage::Error`] for the pipeline to treat as fatal.

use std::fmt;
use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::Result;
use crate::filter::is_media_source;

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File content was written.
    Write,
    /// File appeared.
    Create,
    /// File was renamed away or moved.
    Rename,
    /// File was deleted.
    Remove,
    /// Metadata-only change (permissions, timestamps).
    Chmod,
    /// Anything the backend reports that fits none of the above.
    Other,
}

/// A single filesystem notification, reduced to what the pipeline acts on.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Affected path, as reported by the backend.
    pub path: PathBuf,
    /// Classified change kind.
    pub kind: ChangeKind,
}

/// Message drained from a [`ChangeFeed`].
#[derive(Debug)]
pub enum FeedMessage {
    /// A classified notification.
    Event(ChangeEvent),
    /// The underlying notification mechanism reported an error. The
    /// pipeline treats this as fatal.
    Error(String),
}

const FEED_CHANNEL_CAPACITY: usize = 256;

/// Async stream of [`FeedMessage`]s for one watched directory.
///
/// The production feed is backed by a [`RecommendedWatcher`]; tests inject
/// a scripted producer through [`ChangeFeed::from_channel`]. The channel is
/// the boundary interface.
pub struct ChangeFeed {
    rx: mpsc::Receiver<FeedMessage>,
    // Dropping the watcher stops the notify stream.
    _watcher: Option<RecommendedWatcher>,
}

impl fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("watching", &self._watcher.is_some())
            .finish()
    }
}

impl ChangeFeed {
    /// Start watching `dir` (one level, the drop directory itself) and
    /// return the feed.
    pub fn watch(dir: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let kind = classify_kind(&event.kind);
                    for path in event.paths {
                        let message = FeedMessage::Event(ChangeEvent { path, kind });
                        if tx.blocking_send(message).is_err() {
                            warn!("change feed channel closed, dropping event");
                            return;
                        }
                    }
                }
                Err(err) => {
                    let _ = tx.blocking_send(FeedMessage::Error(err.to_string()));
                }
            },
            NotifyConfig::default(),
        )?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            rx,
            _watcher: Some(watcher),
        })
    }

    /// Build a feed from an already-constructed channel, letting a scripted
    /// producer stand in for the OS notification stream.
    pub fn from_channel(rx: mpsc::Receiver<FeedMessage>) -> Self {
        Self { rx, _watcher: None }
    }

    /// Next message, or `None` once every producer is gone.
    pub async fn next(&mut self) -> Option<FeedMessage> {
        self.rx.recv().await
    }
}

/// Enumerate eligible media files already present in `dir`.
///
/// The catch-up pass for files that landed before the watch was
/// established: one directory level, files only, filtered through the
/// extension gate.
pub fn scan_existing(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        if is_media_source(&path) {
            found.push(path);
        }
    }
    Ok(found)
}

fn classify_kind(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::Create,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => ChangeKind::Write,
        EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::Chmod,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Rename,
        EventKind::Remove(_) => ChangeKind::Remove,
        _ => ChangeKind::Other,
    }
}
