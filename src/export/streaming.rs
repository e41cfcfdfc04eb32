//! Scroll-based page source for export operations
//!
//! This module defines the backend contract the pipeline consumes and the
//! single producer task that walks a scroll from start to finish, handing
//! each record to the worker pool one at a time.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{ExportError, Result};

use super::state::RunState;

/// One backend document, kept as raw JSON text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Name of the index the document was read from
    pub index: String,
    /// Serialized `_source` document
    pub source: String,
}

impl RawRecord {
    pub fn new(index: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            source: source.into(),
        }
    }
}

/// One batch of records returned by the backend
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records in backend order
    pub records: Vec<RawRecord>,
    /// Continuation handle for the next fetch
    pub scroll_id: Option<String>,
}

impl Page {
    /// A page with no records marks the end of the scroll
    pub fn is_exhausted(&self) -> bool {
        self.records.is_empty()
    }
}

/// Paginated search backend
///
/// `open_scroll` establishes a keep-alive lease and returns the first page.
/// Every later page must be requested with the scroll id of the page before
/// it. `clear_scroll` releases the lease.
#[async_trait]
pub trait ScrollBackend: Send + Sync {
    /// Count documents matching the query
    async fn count_matching(&self, query: &Value) -> Result<u64>;

    /// Open a scroll and fetch its first page
    async fn open_scroll(&self, query: &Value, page_size: usize, keep_alive: &str)
    -> Result<Page>;

    /// Fetch the page following `scroll_id`
    async fn fetch_next(&self, scroll_id: &str, keep_alive: &str) -> Result<Page>;

    /// Release the scroll lease
    async fn clear_scroll(&self, scroll_id: &str) -> Result<()>;
}

/// Counters reported by the page source when it returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Pages received from the backend, including the first
    pub pages: u64,
    /// Records handed to the worker pool
    pub records: u64,
}

/// The producer side of the pipeline
pub struct PageSource {
    backend: Arc<dyn ScrollBackend>,
    query: Value,
    page_size: usize,
    keep_alive: String,
}

impl PageSource {
    /// Create a new page source
    ///
    /// # Arguments
    /// * `backend` - Backend to scroll
    /// * `query` - Query clause shared with the count request
    /// * `page_size` - Documents per page
    /// * `keep_alive` - Scroll lease duration, e.g. `2m`
    pub fn new(
        backend: Arc<dyn ScrollBackend>,
        query: Value,
        page_size: usize,
        keep_alive: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            query,
            page_size,
            keep_alive: keep_alive.into(),
        }
    }

    /// Scroll until exhaustion, failure or cancellation
    ///
    /// Consumes `tx`, so the record channel closes when this returns. A fetch
    /// failure is recorded on `state` and stops the scroll; it is never
    /// retried. The scroll lease is cleared on every path.
    pub async fn run(self, tx: mpsc::Sender<RawRecord>, state: &RunState) -> SourceStats {
        let mut stats = SourceStats::default();
        let mut scroll_id: Option<String> = None;

        if let Err(e) = self.scroll(&tx, state, &mut scroll_id, &mut stats).await {
            state.fail(e);
        }
        drop(tx);

        if let Some(id) = scroll_id {
            if let Err(e) = self.backend.clear_scroll(&id).await {
                warn!("Failed to clear scroll: {}", e);
            } else {
                debug!("Cleared scroll after {} pages", stats.pages);
            }
        }

        info!(
            "Page source finished: {} pages, {} records",
            stats.pages, stats.records
        );
        stats
    }

    async fn scroll(
        &self,
        tx: &mpsc::Sender<RawRecord>,
        state: &RunState,
        scroll_id: &mut Option<String>,
        stats: &mut SourceStats,
    ) -> std::result::Result<(), ExportError> {
        loop {
            if state.is_cancelled() {
                debug!("Page source cancelled before fetch #{}", stats.pages + 1);
                return Ok(());
            }

            let fetch = async {
                match scroll_id.as_deref() {
                    None => {
                        self.backend
                            .open_scroll(&self.query, self.page_size, &self.keep_alive)
                            .await
                    }
                    Some(id) => self.backend.fetch_next(id, &self.keep_alive).await,
                }
            };

            let page = tokio::select! {
                biased;
                _ = state.cancelled() => {
                    debug!("Page source cancelled during fetch #{}", stats.pages + 1);
                    return Ok(());
                }
                page = fetch => page.map_err(|e| ExportError::Fetch(e.to_string()))?,
            };

            if let Some(id) = page.scroll_id.clone() {
                *scroll_id = Some(id);
            }
            stats.pages += 1;

            if page.is_exhausted() {
                debug!("Scroll exhausted after {} records", stats.records);
                return Ok(());
            }
            debug!(
                "Fetched page #{} with {} records",
                stats.pages,
                page.records.len()
            );

            for record in page.records {
                tokio::select! {
                    biased;
                    _ = state.cancelled() => return Ok(()),
                    sent = tx.send(record) => {
                        if sent.is_err() {
                            // Every worker has exited.
                            return Ok(());
                        }
                    }
                }
                stats.records += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_page_is_exhausted() {
        assert!(Page::default().is_exhausted());
        let page = Page {
            records: vec![RawRecord::new("leak_a", "{}")],
            scroll_id: Some("s1".into()),
        };
        assert!(!page.is_exhausted());
    }
}
