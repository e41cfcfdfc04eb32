//! Transform/write workers
//!
//! Each worker pulls one record at a time from the shared receiver, decodes
//! it, drops records without a usable email and writes the rest. Workers do
//! not talk to each other; the only shared state is the run state and the
//! sink.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace};

use crate::error::ExportError;

use super::record::{ParsedRecord, origin_tag};
use super::state::RunState;
use super::streaming::RawRecord;
use super::writers::RecordSink;

/// Receiving end of the record channel, shared by the pool
pub type SharedReceiver = Arc<Mutex<mpsc::Receiver<RawRecord>>>;

/// Per-worker tallies, summed by the coordinator on join
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub written: u64,
    pub skipped: u64,
}

enum Disposition {
    Written,
    Skipped,
}

/// One consumer of the record channel
pub struct Worker {
    id: usize,
    rx: SharedReceiver,
    sink: Arc<dyn RecordSink>,
    state: Arc<RunState>,
}

impl Worker {
    pub fn new(
        id: usize,
        rx: SharedReceiver,
        sink: Arc<dyn RecordSink>,
        state: Arc<RunState>,
    ) -> Self {
        Self {
            id,
            rx,
            sink,
            state,
        }
    }

    /// Process records until the channel is drained or the run is cancelled
    ///
    /// Cancellation is checked between records, never in the middle of one.
    /// Records still queued when the run is cancelled are left behind.
    pub async fn run(self) -> WorkerStats {
        let mut stats = WorkerStats::default();

        loop {
            if self.state.is_cancelled() {
                debug!("Worker {} stopping on cancellation", self.id);
                break;
            }

            let Some(record) = self.next_record().await else {
                break;
            };

            match self.process(&record).await {
                Ok(Disposition::Written) => stats.written += 1,
                Ok(Disposition::Skipped) => stats.skipped += 1,
                Err(e) => {
                    self.state.fail(e);
                    break;
                }
            }
        }

        debug!(
            "Worker {} finished: {} written, {} skipped",
            self.id, stats.written, stats.skipped
        );
        stats
    }

    async fn next_record(&self) -> Option<RawRecord> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = self.state.cancelled() => None,
            record = rx.recv() => record,
        }
    }

    async fn process(&self, raw: &RawRecord) -> std::result::Result<Disposition, ExportError> {
        self.sink
            .write_raw(raw)
            .await
            .map_err(|e| ExportError::Write(e.to_string()))?;

        let record = ParsedRecord::parse(&raw.source)?;
        if !record.is_accepted() {
            trace!("Worker {} skipped record from {}", self.id, raw.index);
            return Ok(Disposition::Skipped);
        }

        self.sink
            .write_record(&record, &origin_tag(&raw.index))
            .await
            .map_err(|e| ExportError::Write(e.to_string()))?;
        self.state.record_written();
        Ok(Disposition::Written)
    }
}
