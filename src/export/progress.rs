//! Progress tracking for export operations
//!
//! This module provides progress bar and statistics tracking for long-running
//! export operations, giving users real-time feedback on export progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;

/// A point-in-time progress reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Records written so far
    pub processed: u64,
    /// Estimated total from the count query, if known
    pub total: Option<u64>,
}

/// Progress tracker for export operations
///
/// Tracks document processing progress and displays a progress bar
/// with statistics like speed and ETA. The counter only grows, so readers
/// may poll it at any time without further synchronization.
pub struct ProgressTracker {
    /// Number of documents processed so far
    processed: AtomicU64,
    /// Total estimate obtained before the run
    total: Option<u64>,
    /// Start time of the operation
    start_time: Instant,
    /// Progress bar (optional, can be disabled)
    bar: Option<ProgressBar>,
    /// Publishes snapshots to listeners
    updates: Arc<watch::Sender<Progress>>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `total` - Total number of documents if known (None for unknown)
    /// * `enable_bar` - Whether to display a progress bar
    pub fn new(total: Option<u64>, enable_bar: bool) -> Self {
        let (tx, _rx) = watch::channel(Progress {
            processed: 0,
            total,
        });
        Self::with_updates(total, enable_bar, Arc::new(tx))
    }

    /// Create a tracker that publishes to an existing watch channel
    pub fn with_updates(
        total: Option<u64>,
        enable_bar: bool,
        updates: Arc<watch::Sender<Progress>>,
    ) -> Self {
        let bar = enable_bar.then(|| match total {
            Some(n) => {
                let bar = ProgressBar::new(n);
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-");
                bar.set_style(style);
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                let style = ProgressStyle::default_spinner()
                    .template("{spinner:.green} {pos} records {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner());
                bar.set_style(style);
                bar
            }
        });

        updates.send_replace(Progress {
            processed: 0,
            total,
        });

        Self {
            processed: AtomicU64::new(0),
            total,
            start_time: Instant::now(),
            bar,
            updates,
        }
    }

    /// Count one processed record
    ///
    /// # Returns
    /// * `u64` - The processed count including this record
    pub fn increment(&self) -> u64 {
        let count = self.processed.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(ref bar) = self.bar {
            bar.inc(1);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = count as f64 / elapsed;
                bar.set_message(format!("({:.0} records/sec)", speed));
            }
        }

        // Increments can publish out of order; keep the highest count.
        self.updates.send_modify(|progress| {
            progress.processed = progress.processed.max(count);
        });
        count
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Current reading of processed against total
    pub fn snapshot(&self) -> Progress {
        Progress {
            processed: self.processed(),
            total: self.total,
        }
    }

    /// Subscribe to progress snapshots
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.updates.subscribe()
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
