//! Quiet-period tracking for paths with recent write activity.
//!
//! Each tracked path moves through Untracked -> Pending -> Expired or
//! Purged. Write/Create events (re)start the quiet period, Rename/Remove
//! delete the entry outright, and the periodic sweep converts entries whose
//! quiet period has fully elapsed into conversion candidates.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::feed::{ChangeEvent, ChangeKind};

/// How long a path must go without further write activity before it is
/// considered settled and eligible for conversion.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(120);

/// Pending conversion trigger for one path.
#[derive(Debug, Clone)]
struct PendingTrigger {
    observed_at: Instant,
    quiet_period: Duration,
}

impl PendingTrigger {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.observed_at) > self.quiet_period
    }
}

/// Concurrency-safe table of paths waiting out their quiet period.
///
/// The table owns every trigger; callers interact only through the
/// operations below. Operations on one path are serialized by the internal
/// lock, so a refresh racing a sweep either re-arms the entry before the
/// sweep reads it or re-creates it after removal.
#[derive(Debug)]
pub struct DebounceTable {
    quiet_period: Duration,
    entries: Mutex<HashMap<PathBuf, PendingTrigger>>,
}

impl DebounceTable {
    /// Table with the default quiet period.
    pub fn new() -> Self {
        Self::with_quiet_period(DEFAULT_QUIET_PERIOD)
    }

    /// Table with a custom quiet period. The state machine is unchanged;
    /// only the expiry horizon moves.
    pub fn with_quiet_period(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Route one change event to the matching transition.
    pub fn apply(&self, event: &ChangeEvent) {
        match event.kind {
            ChangeKind::Write | ChangeKind::Create => self.refresh(&event.path),
            // A rename fires against the old name; the new name shows up as
            // a separate create. Removal of either kind drops the trigger.
            ChangeKind::Rename | ChangeKind::Remove => self.purge(&event.path),
            // Metadata-only changes say nothing about content settling.
            ChangeKind::Chmod => {}
            ChangeKind::Other => {
                debug!(path = %event.path.display(), "unclassified change kind, ignoring");
            }
        }
    }

    /// Start or restart the quiet period for `path`.
    pub fn refresh(&self, path: &Path) {
        let trigger = PendingTrigger {
            observed_at: Instant::now(),
            quiet_period: self.quiet_period,
        };
        self.entries.lock().insert(path.to_path_buf(), trigger);
    }

    /// Drop any pending trigger for `path`; no conversion fires for it.
    pub fn purge(&self, path: &Path) {
        self.entries.lock().remove(path);
    }

    /// Remove and return every path whose quiet period has elapsed.
    ///
    /// Removal happens under a single lock acquisition, so one sweep never
    /// yields the same path twice.
    pub fn sweep_expired(&self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut expired = Vec::new();
        self.entries.lock().retain(|path, trigger| {
            if trigger.is_expired(now) {
                debug!(path = %path.display(), "quiet period elapsed");
                expired.push(path.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Number of paths currently waiting out their quiet period.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when no path is being tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for DebounceTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use tokio::time::advance;

    use super::{DEFAULT_QUIET_PERIOD, DebounceTable};
    use crate::feed::{ChangeEvent, ChangeKind};

    fn event(path: &str, kind: ChangeKind) -> ChangeEvent {
        ChangeEvent {
            path: PathBuf::from(path),
            kind,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_extends_the_quiet_window() {
        let table = DebounceTable::new();
        let path = PathBuf::from("/media/in/a.mp4");

        table.refresh(&path);
        advance(Duration::from_secs(110)).await;
        table.refresh(&path);

        // 115s after the refresh: still inside the window.
        advance(Duration::from_secs(115)).await;
        assert!(table.sweep_expired().is_empty());

        advance(Duration::from_secs(10)).await;
        assert_eq!(table.sweep_expired(), vec![path]);
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_emits_each_path_at_most_once() {
        let table = DebounceTable::new();
        table.refresh(&PathBuf::from("/media/in/a.mp4"));
        table.refresh(&PathBuf::from("/media/in/b.mp4"));

        advance(DEFAULT_QUIET_PERIOD + Duration::from_secs(1)).await;
        let mut settled = table.sweep_expired();
        settled.sort();
        assert_eq!(
            settled,
            vec![
                PathBuf::from("/media/in/a.mp4"),
                PathBuf::from("/media/in/b.mp4"),
            ]
        );
        assert!(table.sweep_expired().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_before_expiry_means_no_trigger() {
        let table = DebounceTable::new();

        table.apply(&event("/media/in/a.mp4", ChangeKind::Write));
        advance(Duration::from_secs(60)).await;
        table.apply(&event("/media/in/a.mp4", ChangeKind::Remove));
        assert_eq!(table.len(), 0);

        advance(Duration::from_secs(300)).await;
        assert!(table.sweep_expired().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn chmod_and_unclassified_events_do_not_track() {
        let table = DebounceTable::new();
        table.apply(&event("/media/in/a.mp4", ChangeKind::Chmod));
        table.apply(&event("/media/in/a.mp4", ChangeKind::Other));
        assert_eq!(table.len(), 0);

        table.apply(&event("/media/in/a.mp4", ChangeKind::Write));
        assert_eq!(table.len(), 1);
        // Chmod on a pending path leaves its window untouched.
        table.apply(&event("/media/in/a.mp4", ChangeKind::Chmod));
        assert_eq!(table.len(), 1);
    }

    /// The worked example from the design discussion: writes at t=0 and
    /// t=30s, sweeps at t=120s and t=150s, trigger at the next tick after
    /// the refreshed window closes.
    #[tokio::test(start_paused = true)]
    async fn refreshed_entry_survives_the_original_deadline() {
        let table = DebounceTable::new();
        let path = PathBuf::from("/src/a.mp4");

        table.refresh(&path); // t=0
        advance(Duration::from_secs(30)).await;
        table.refresh(&path); // t=30, window now closes at t=150

        advance(Duration::from_secs(90)).await; // t=120
        assert!(table.sweep_expired().is_empty());

        advance(Duration::from_secs(30)).await; // t=150, boundary is exclusive
        assert!(table.sweep_expired().is_empty());

        advance(Duration::from_secs(10)).await; // t=160
        assert_eq!(table.sweep_expired(), vec![path]);
    }
}
