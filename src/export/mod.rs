//! Export module for concurrent scroll exports
//!
//! This module provides the export pipeline:
//! - A single page source scrolls the backend in order
//! - A record channel hands records over one at a time (capacity 1)
//! - A fixed pool of workers decodes, filters and writes records
//! - A progress tracker counts written records against the total estimate
//!
//! # Architecture
//!
//! 1. **PageSource**: producer walking the scroll and releasing it on exit
//! 2. **Worker**: consumer decoding, filtering and writing records
//! 3. **RecordSink**: serialized appends to the CSV file and raw dump
//! 4. **RunState**: processed counter, first-error slot and cancellation token
//!
//! These components are orchestrated by the **ExportCoordinator**. The first
//! fatal error from any participant cancels every other participant; the
//! coordinator joins them all before returning.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use hoardd::config::ConnectionConfig;
//! use hoardd::connection::ElasticClient;
//! use hoardd::export::{ExportCoordinator, ExportSink, PipelineOptions};
//!
//! # async fn run() -> hoardd::Result<()> {
//! let client = ElasticClient::connect(&ConnectionConfig::default()).await?;
//! let sink = ExportSink::create(Path::new("out.csv"), None, false, 1000).await?;
//! let query = serde_json::json!({"match_all": {}});
//!
//! let coordinator = ExportCoordinator::new(Arc::new(client), Arc::new(sink), PipelineOptions::new(query));
//! let result = coordinator.execute().await?;
//! println!("{} written, {} skipped", result.records_written, result.records_skipped);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod progress;
pub mod record;
pub mod state;
pub mod streaming;
pub mod worker;
pub mod writers;

pub use coordinator::{ExportCoordinator, ExportResult, PipelineOptions};
pub use progress::{Progress, ProgressTracker};
pub use record::ParsedRecord;
pub use state::ExportOutcome;
pub use streaming::{Page, PageSource, RawRecord, ScrollBackend};
pub use writers::{CsvWriter, ExportSink, JsonLWriter, RecordSink};
