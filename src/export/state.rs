//! Shared state for one export run
//!
//! The producer and every worker hold the same `RunState`. Only three things
//! in it are mutated concurrently: the processed counter (atomic, inside the
//! progress tracker), the first-error slot (set once) and the cancellation
//! token.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error, info};

use crate::error::ExportError;

use super::progress::ProgressTracker;

/// Terminal state of an export run
#[derive(Debug, Clone)]
pub enum ExportOutcome {
    /// The scroll was exhausted and every record was processed
    Completed,
    /// The record limit was reached
    ///
    /// Takes precedence over `Completed` when the limit is hit on the last
    /// record of the scroll.
    LimitReached,
    /// The caller cancelled the run
    Cancelled,
    /// A participant failed; holds the first recorded error
    Failed(ExportError),
}

impl ExportOutcome {
    /// Whether the run ended without a failure
    pub fn is_success(&self) -> bool {
        !matches!(self, ExportOutcome::Failed(_))
    }
}

/// State shared by all pipeline participants
pub struct RunState {
    progress: ProgressTracker,
    limit: u64,
    cancel: CancellationToken,
    limit_reached: AtomicBool,
    first_error: OnceLock<ExportError>,
}

impl RunState {
    /// Create the state for one run
    ///
    /// # Arguments
    /// * `progress` - Tracker holding the processed counter
    /// * `limit` - Maximum records to write, 0 for no limit
    /// * `cancel` - Token shared by every participant of this run
    pub fn new(progress: ProgressTracker, limit: u64, cancel: CancellationToken) -> Self {
        Self {
            progress,
            limit,
            cancel,
            limit_reached: AtomicBool::new(false),
            first_error: OnceLock::new(),
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run is cancelled for any reason
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Record a fatal error and cancel the run
    ///
    /// Only the first error is kept. Returns `true` if this call recorded it.
    pub fn fail(&self, err: ExportError) -> bool {
        let recorded = match self.first_error.set(err) {
            Ok(()) => {
                if let Some(e) = self.first_error.get() {
                    error!("Export failed: {}", e);
                }
                true
            }
            Err(later) => {
                debug!("Discarding error after first failure: {}", later);
                false
            }
        };
        self.cancel.cancel();
        recorded
    }

    /// Count one written record, cancelling the run when the limit is hit
    pub fn record_written(&self) -> u64 {
        let processed = self.progress.increment();
        if self.limit > 0
            && processed >= self.limit
            && !self.limit_reached.swap(true, Ordering::AcqRel)
        {
            info!("Limit of {} results reached", self.limit);
            self.cancel.cancel();
        }
        processed
    }

    /// Resolve the terminal state once every participant has returned
    ///
    /// Failure wins over the limit, and the limit wins over an external
    /// cancellation.
    pub fn outcome(&self) -> ExportOutcome {
        if let Some(e) = self.first_error.get() {
            ExportOutcome::Failed(e.clone())
        } else if self.limit_reached.load(Ordering::Acquire) {
            ExportOutcome::LimitReached
        } else if self.cancel.is_cancelled() {
            ExportOutcome::Cancelled
        } else {
            ExportOutcome::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(limit: u64) -> RunState {
        RunState::new(ProgressTracker::new(Some(10), false), limit, CancellationToken::new())
    }

    #[test]
    fn test_first_error_wins() {
        let state = state(0);
        assert!(state.fail(ExportError::Parse("first".into())));
        assert!(!state.fail(ExportError::Fetch("second".into())));
        assert!(state.is_cancelled());
        match state.outcome() {
            ExportOutcome::Failed(ExportError::Parse(msg)) => assert_eq!(msg, "first"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_limit_cancels_run() {
        let state = state(2);
        state.record_written();
        assert!(!state.is_cancelled());
        state.record_written();
        assert!(state.is_cancelled());
        assert!(matches!(state.outcome(), ExportOutcome::LimitReached));
    }

    #[test]
    fn test_limit_on_last_record_is_limit_reached() {
        let state = RunState::new(ProgressTracker::new(Some(3), false), 3, CancellationToken::new());
        for _ in 0..3 {
            state.record_written();
        }
        assert!(matches!(state.outcome(), ExportOutcome::LimitReached));
    }

    #[test]
    fn test_zero_limit_never_cancels() {
        let state = state(0);
        for _ in 0..100 {
            state.record_written();
        }
        assert!(!state.is_cancelled());
        assert!(matches!(state.outcome(), ExportOutcome::Completed));
        assert_eq!(state.progress().processed(), 100);
    }

    #[test]
    fn test_external_cancel_outcome() {
        let token = CancellationToken::new();
        let state = RunState::new(ProgressTracker::new(None, false), 0, token.clone());
        token.cancel();
        assert!(matches!(state.outcome(), ExportOutcome::Cancelled));
    }
}
