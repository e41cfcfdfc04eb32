//! Export coordinator for orchestrating export operations
//!
//! This module provides the coordinator that runs one page source and a pool
//! of workers under a single cancellation scope, joins them all, and turns
//! their combined state into one [`ExportResult`].
//!
//! Records leave the backend in page order, but several workers write
//! concurrently, so rows in the output file are not in fetch order.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ExportError, QueryError, Result};

use super::progress::{Progress, ProgressTracker};
use super::state::{ExportOutcome, RunState};
use super::streaming::{PageSource, RawRecord, ScrollBackend, SourceStats};
use super::worker::{Worker, WorkerStats};
use super::writers::RecordSink;

/// Tunables for one export run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Query clause used for both counting and scrolling
    pub query: Value,
    /// Documents per scroll page
    pub page_size: usize,
    /// Scroll lease duration
    pub keep_alive: String,
    /// Number of concurrent workers
    pub workers: usize,
    /// Maximum records to write, 0 for no limit
    pub limit: u64,
    /// Draw a progress bar on the terminal
    pub show_progress: bool,
}

impl PipelineOptions {
    pub fn new(query: Value) -> Self {
        Self {
            query,
            page_size: 1000,
            keep_alive: "2m".to_string(),
            workers: 10,
            limit: 0,
            show_progress: false,
        }
    }
}

/// Result of an export operation
#[derive(Debug)]
pub struct ExportResult {
    /// Records written to the output
    pub records_written: u64,
    /// Records dropped for an empty or null email
    pub records_skipped: u64,
    /// Records handed to the worker pool by the page source
    pub records_fetched: u64,
    /// Pages received from the backend
    pub pages_fetched: u64,
    /// Total estimate from the count query
    pub total_estimate: u64,
    /// Size of the primary output file in bytes
    pub file_size_bytes: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
    /// How the run ended
    pub outcome: ExportOutcome,
}

impl ExportResult {
    /// The fatal error, if the run failed
    pub fn error(&self) -> Option<&ExportError> {
        match self.outcome {
            ExportOutcome::Failed(ref e) => Some(e),
            _ => None,
        }
    }
}

enum Participant {
    Source(SourceStats),
    Worker(WorkerStats),
}

/// Coordinator for export operations
pub struct ExportCoordinator {
    /// Backend to count and scroll
    backend: Arc<dyn ScrollBackend>,
    /// Destination for processed records
    sink: Arc<dyn RecordSink>,
    /// Pipeline tunables
    options: PipelineOptions,
    /// Cancellation token of the caller
    cancel_token: Option<CancellationToken>,
    /// Progress snapshots published during the run
    progress: Arc<watch::Sender<Progress>>,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(
        backend: Arc<dyn ScrollBackend>,
        sink: Arc<dyn RecordSink>,
        options: PipelineOptions,
    ) -> Self {
        let (tx, _rx) = watch::channel(Progress::default());
        Self {
            backend,
            sink,
            options,
            cancel_token: None,
            progress: Arc::new(tx),
        }
    }

    /// Set cancellation token for this export operation
    ///
    /// The run derives a child token from it, so cancelling the parent stops
    /// the run while a failure inside the run leaves the parent untouched.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Subscribe to `{processed, total}` progress snapshots
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Execute the export operation
    ///
    /// 1. Count matching documents to size the progress display
    /// 2. Start the page source and the worker pool
    /// 3. Join every participant
    /// 4. Flush the sink and report the outcome
    ///
    /// # Returns
    /// * `Result<ExportResult>` - Export statistics; pipeline failures are
    ///   reported in [`ExportResult::outcome`], setup failures as `Err`
    pub async fn execute(&self) -> Result<ExportResult> {
        let start_time = Instant::now();
        let options = &self.options;

        info!("Counting total hits");
        let total = self.backend.count_matching(&options.query).await?;
        if total == 0 {
            return Err(QueryError::NoResults.into());
        }
        if options.limit == 0 {
            warn!("No limit defined, exporting all {} matching records", total);
        }

        let run_token = match self.cancel_token {
            Some(ref parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let tracker =
            ProgressTracker::with_updates(Some(total), options.show_progress, self.progress.clone());
        let state = Arc::new(RunState::new(tracker, options.limit, run_token));

        info!(
            "Starting export: {} records, {} workers, page size {}",
            total, options.workers, options.page_size
        );

        let (tx, rx) = mpsc::channel::<RawRecord>(1);
        let rx = Arc::new(Mutex::new(rx));
        let mut tasks = JoinSet::new();

        let source = PageSource::new(
            self.backend.clone(),
            options.query.clone(),
            options.page_size,
            options.keep_alive.clone(),
        );
        {
            let state = state.clone();
            tasks.spawn(async move { Participant::Source(source.run(tx, &state).await) });
        }

        for id in 0..options.workers.max(1) {
            let worker = Worker::new(id, rx.clone(), self.sink.clone(), state.clone());
            tasks.spawn(async move { Participant::Worker(worker.run().await) });
        }
        drop(rx);

        let mut source_stats = SourceStats::default();
        let mut written = 0u64;
        let mut skipped = 0u64;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Participant::Source(stats)) => source_stats = stats,
                Ok(Participant::Worker(stats)) => {
                    written += stats.written;
                    skipped += stats.skipped;
                }
                Err(e) => {
                    state.fail(ExportError::Task(e.to_string()));
                }
            }
        }

        debug!("Finalizing output");
        if let Err(e) = self.sink.finalize().await {
            state.fail(ExportError::Write(e.to_string()));
        }

        state.progress().finish();
        let progress = state.progress().snapshot();
        debug!(
            "Progress at finish: {}/{}",
            progress.processed,
            progress.total.unwrap_or_default()
        );
        let outcome = state.outcome();
        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        let file_size_bytes = self.sink.file_size().await.unwrap_or(0);

        match outcome {
            ExportOutcome::Failed(ref e) => warn!(
                "Export failed with {} error after {} records: {}",
                e.kind(),
                written,
                e
            ),
            _ => info!(
                "Export finished ({:?}): {} written, {} skipped, {} ms",
                outcome, written, skipped, elapsed_ms
            ),
        }

        Ok(ExportResult {
            records_written: written,
            records_skipped: skipped,
            records_fetched: source_stats.records,
            pages_fetched: source_stats.pages,
            total_estimate: total,
            file_size_bytes,
            elapsed_ms,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HoarddError;
    use crate::export::record::ParsedRecord;
    use crate::export::streaming::Page;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // In-memory scroll backend for testing
    struct MockBackend {
        pages: Vec<Vec<RawRecord>>,
        fail_on_fetch: Option<usize>,
        hang_after: Option<usize>,
        fetches: AtomicUsize,
        cleared: StdMutex<Vec<String>>,
    }

    impl MockBackend {
        fn new(pages: Vec<Vec<RawRecord>>) -> Self {
            Self {
                pages,
                fail_on_fetch: None,
                hang_after: None,
                fetches: AtomicUsize::new(0),
                cleared: StdMutex::new(Vec::new()),
            }
        }

        /// Fail the n-th fetch (1-based, counting the opening fetch)
        fn failing_on(mut self, n: usize) -> Self {
            self.fail_on_fetch = Some(n);
            self
        }

        /// Never answer fetches after the first n
        fn hanging_after(mut self, n: usize) -> Self {
            self.hang_after = Some(n);
            self
        }

        async fn page(&self) -> Result<Page> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_fetch == Some(n) {
                return Err(HoarddError::Generic("search_phase_execution_exception".into()));
            }
            if self.hang_after.is_some_and(|h| n > h) {
                std::future::pending::<()>().await;
            }
            Ok(Page {
                records: self.pages.get(n - 1).cloned().unwrap_or_default(),
                scroll_id: Some(format!("scroll-{n}")),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        fn cleared(&self) -> Vec<String> {
            self.cleared.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScrollBackend for MockBackend {
        async fn count_matching(&self, _query: &Value) -> Result<u64> {
            Ok(self.pages.iter().map(|p| p.len() as u64).sum())
        }

        async fn open_scroll(&self, _query: &Value, _size: usize, _keep: &str) -> Result<Page> {
            self.page().await
        }

        async fn fetch_next(&self, scroll_id: &str, _keep: &str) -> Result<Page> {
            assert_eq!(scroll_id, format!("scroll-{}", self.fetches()));
            self.page().await
        }

        async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
            self.cleared.lock().unwrap().push(scroll_id.to_string());
            Ok(())
        }
    }

    // Collecting sink for testing
    #[derive(Default)]
    struct MemorySink {
        rows: StdMutex<Vec<String>>,
        raw: AtomicUsize,
        fail_writes: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn write_record(&self, record: &ParsedRecord, origin: &str) -> Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_writes {
                return Err(std::io::Error::other("disk full").into());
            }
            self.rows
                .lock()
                .unwrap()
                .push(format!("{},{},{}", record.email, record.password, origin));
            Ok(())
        }

        async fn write_raw(&self, _raw: &RawRecord) -> Result<()> {
            self.raw.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn finalize(&self) -> Result<()> {
            Ok(())
        }
    }

    fn doc(email: &str) -> RawRecord {
        RawRecord::new(
            "leak_test",
            serde_json::json!({ "email": email, "password": "pw" }).to_string(),
        )
    }

    fn numbered(start: usize, count: usize) -> Vec<RawRecord> {
        (start..start + count).map(|i| doc(&format!("user{i}@x.com"))).collect()
    }

    fn options(workers: usize, limit: u64) -> PipelineOptions {
        let mut options = PipelineOptions::new(serde_json::json!({"match_all": {}}));
        options.workers = workers;
        options.limit = limit;
        options
    }

    async fn run(
        backend: Arc<MockBackend>,
        sink: Arc<MemorySink>,
        options: PipelineOptions,
    ) -> ExportResult {
        let coordinator = ExportCoordinator::new(backend, sink, options);
        tokio::time::timeout(Duration::from_secs(10), coordinator.execute())
            .await
            .expect("export did not finish")
            .unwrap()
    }

    #[tokio::test]
    async fn test_filters_empty_and_null_identifiers() {
        let backend = Arc::new(MockBackend::new(vec![vec![
            doc("a@x.com"),
            doc(""),
            doc("null"),
        ]]));
        let sink = Arc::new(MemorySink::default());

        let result = run(backend.clone(), sink.clone(), options(10, 0)).await;

        assert!(matches!(result.outcome, ExportOutcome::Completed));
        assert_eq!(result.records_written, 1);
        assert_eq!(result.records_skipped, 2);
        assert_eq!(*sink.rows.lock().unwrap(), vec!["a@x.com,pw,test".to_string()]);
        assert_eq!(sink.raw.load(Ordering::SeqCst), 3);
        assert_eq!(backend.cleared(), vec!["scroll-2".to_string()]);
    }

    #[tokio::test]
    async fn test_every_record_delivered_exactly_once() {
        let pages = vec![numbered(0, 100), numbered(100, 100), numbered(200, 57)];
        let backend = Arc::new(MockBackend::new(pages));
        let sink = Arc::new(MemorySink::default());

        let coordinator = ExportCoordinator::new(backend.clone(), sink.clone(), options(4, 0));
        let progress = coordinator.subscribe();
        let result = coordinator.execute().await.unwrap();

        assert!(matches!(result.outcome, ExportOutcome::Completed));
        assert_eq!(result.records_fetched, 257);
        assert_eq!(result.records_written + result.records_skipped, result.records_fetched);
        assert_eq!(result.pages_fetched, 4);
        assert_eq!(progress.borrow().processed, result.records_written);
        assert_eq!(progress.borrow().total, Some(257));

        let rows = sink.rows.lock().unwrap();
        let unique: HashSet<&String> = rows.iter().collect();
        assert_eq!(rows.len(), 257);
        assert_eq!(unique.len(), 257);
    }

    #[tokio::test]
    async fn test_fetch_error_fails_run_without_further_fetches() {
        let pages = vec![numbered(0, 20), numbered(20, 20), numbered(40, 20)];
        let backend = Arc::new(MockBackend::new(pages).failing_on(2));
        let sink = Arc::new(MemorySink::default());

        let result = run(backend.clone(), sink.clone(), options(3, 0)).await;

        match result.error() {
            Some(ExportError::Fetch(msg)) => {
                assert!(msg.contains("search_phase_execution_exception"))
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
        assert_eq!(backend.fetches(), 2);
        assert!(result.records_written <= 20);
        assert_eq!(backend.cleared(), vec!["scroll-1".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_on_open_clears_nothing() {
        let backend = Arc::new(MockBackend::new(vec![numbered(0, 5)]).failing_on(1));
        let sink = Arc::new(MemorySink::default());

        let result = run(backend.clone(), sink, options(2, 0)).await;

        assert!(matches!(result.error(), Some(ExportError::Fetch(_))));
        assert_eq!(result.records_written, 0);
        assert!(backend.cleared().is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_is_fatal() {
        let mut pages: Vec<Vec<RawRecord>> = (0..50).map(|p| numbered(p * 10, 10)).collect();
        pages[0].insert(0, RawRecord::new("leak_test", r#"{"email": 42}"#));
        let backend = Arc::new(MockBackend::new(pages));
        let sink = Arc::new(MemorySink::default());

        let result = run(backend.clone(), sink, options(3, 0)).await;

        assert!(matches!(result.error(), Some(ExportError::Parse(_))));
        assert!(!result.outcome.is_success());
        assert!(backend.fetches() <= 2);
        assert!(result.records_fetched < 500);
        assert_eq!(backend.cleared().len(), 1);
    }

    #[tokio::test]
    async fn test_write_error_is_fatal() {
        let pages: Vec<Vec<RawRecord>> = (0..50).map(|p| numbered(p * 10, 10)).collect();
        let backend = Arc::new(MockBackend::new(pages));
        let sink = Arc::new(MemorySink {
            fail_writes: true,
            ..MemorySink::default()
        });

        let result = run(backend.clone(), sink, options(5, 0)).await;

        match result.error() {
            Some(ExportError::Write(msg)) => assert!(msg.contains("disk full")),
            other => panic!("expected write error, got {other:?}"),
        }
        assert_eq!(result.records_written, 0);
        assert!(backend.fetches() <= 2);
        assert_eq!(backend.cleared().len(), 1);
    }

    #[tokio::test]
    async fn test_limit_reached_is_not_failure() {
        let backend = Arc::new(MockBackend::new(vec![numbered(0, 10)]));
        let sink = Arc::new(MemorySink::default());

        let result = run(backend, sink, options(10, 5)).await;

        assert!(matches!(result.outcome, ExportOutcome::LimitReached));
        assert!(result.outcome.is_success());
        assert!(result.records_written >= 5);
        assert!(result.records_written <= 10);
    }

    #[tokio::test]
    async fn test_limit_overshoot_bounded_to_one_page() {
        let pages: Vec<Vec<RawRecord>> = (0..20).map(|p| numbered(p * 10, 10)).collect();
        let backend = Arc::new(MockBackend::new(pages));
        let sink = Arc::new(MemorySink::default());

        let result = run(backend.clone(), sink, options(2, 15)).await;

        assert!(matches!(result.outcome, ExportOutcome::LimitReached));
        assert!(result.records_written >= 15);
        // Page holding the 15th record plus at most one more
        assert!(backend.fetches() <= 3);
        assert_eq!(backend.cleared().len(), 1);
    }

    #[tokio::test]
    async fn test_external_cancellation() {
        let pages = vec![numbered(0, 10), numbered(10, 10)];
        let backend = Arc::new(MockBackend::new(pages).hanging_after(1));
        let sink = Arc::new(MemorySink::default());
        let token = CancellationToken::new();

        let coordinator = ExportCoordinator::new(backend.clone(), sink, options(3, 0))
            .with_cancellation(token.clone());
        let mut progress = coordinator.subscribe();
        let handle = tokio::spawn(async move { coordinator.execute().await });

        // Wait for the first page to be written, then interrupt the hung fetch.
        while progress.borrow_and_update().processed < 10 {
            progress.changed().await.unwrap();
        }
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("cancelled export did not finish")
            .unwrap()
            .unwrap();

        assert!(matches!(result.outcome, ExportOutcome::Cancelled));
        assert_eq!(result.records_written, 10);
        assert_eq!(backend.cleared(), vec!["scroll-1".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_workers_do_not_drain() {
        let backend = Arc::new(MockBackend::new(vec![numbered(0, 200)]));
        let sink = Arc::new(MemorySink {
            delay: Some(Duration::from_millis(5)),
            ..MemorySink::default()
        });

        let result = run(backend, sink, options(2, 3)).await;

        assert!(matches!(result.outcome, ExportOutcome::LimitReached));
        assert!(result.records_written < 10);
        assert!(result.records_fetched < 200);
    }

    #[tokio::test]
    async fn test_zero_total_is_query_error() {
        let backend = Arc::new(MockBackend::new(vec![]));
        let sink = Arc::new(MemorySink::default());

        let coordinator = ExportCoordinator::new(backend.clone(), sink, options(2, 0));
        let err = coordinator.execute().await.unwrap_err();

        assert!(matches!(err, HoarddError::Query(QueryError::NoResults)));
        assert_eq!(backend.fetches(), 0);
    }
}
