//! Output writers for export operations
//!
//! Workers call the sink concurrently through `&self`. Each file sits behind
//! its own async mutex, so a line is always appended whole and lines from
//! different workers never interleave.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ConfigError, Result};

use super::record::ParsedRecord;
use super::streaming::RawRecord;

pub mod csv;
pub mod jsonl;

pub use csv::CsvWriter;
pub use jsonl::JsonLWriter;

/// Destination for processed records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Write one accepted record with its origin tag
    async fn write_record(&self, record: &ParsedRecord, origin: &str) -> Result<()>;

    /// Write one raw document as received from the backend
    async fn write_raw(&self, raw: &RawRecord) -> Result<()>;

    /// Flush all buffered output
    async fn finalize(&self) -> Result<()>;

    /// Size in bytes of the primary output file
    async fn file_size(&self) -> Result<u64> {
        Ok(0)
    }
}

/// How an output file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Start from an empty file
    Truncate,
    /// Keep existing content and write after it
    Append,
}

struct LineState {
    writer: BufWriter<File>,
    pending: usize,
    lines: u64,
}

/// Mutex-guarded, buffered line appender for one file
pub struct LineWriter {
    path: PathBuf,
    flush_every: usize,
    state: Mutex<LineState>,
}

impl LineWriter {
    /// Open a file for line output
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `mode` - Truncate or append
    /// * `flush_every` - Flush after this many buffered lines
    pub async fn open(path: &Path, mode: OpenMode, flush_every: usize) -> Result<Self> {
        let writer = create_writer(path, mode).await?;
        Ok(Self {
            path: path.to_path_buf(),
            flush_every: flush_every.max(1),
            state: Mutex::new(LineState {
                writer,
                pending: 0,
                lines: 0,
            }),
        })
    }

    /// Append one line, adding the trailing newline
    pub async fn append_line(&self, line: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.writer.write_all(line.as_bytes()).await?;
        state.writer.write_all(b"\n").await?;
        state.lines += 1;
        state.pending += 1;
        if state.pending >= self.flush_every {
            state.writer.flush().await?;
            state.pending = 0;
        }
        Ok(())
    }

    pub async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.writer.flush().await?;
        state.pending = 0;
        debug!("Flushed {} ({} lines)", self.path.display(), state.lines);
        Ok(())
    }

    /// Number of lines appended through this writer
    pub async fn lines_written(&self) -> u64 {
        self.state.lock().await.lines
    }

    pub async fn file_size(&self) -> Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The sink used by the command line: a CSV file plus an optional raw dump
pub struct ExportSink {
    csv: CsvWriter,
    dump: Option<JsonLWriter>,
}

impl ExportSink {
    /// Open the output files
    ///
    /// # Arguments
    /// * `outfile` - CSV output path
    /// * `dumpfile` - Optional JSON Lines dump path, always appended to
    /// * `append` - Append to an existing CSV file instead of truncating it
    /// * `flush_every` - Flush each file after this many lines
    pub async fn create(
        outfile: &Path,
        dumpfile: Option<&Path>,
        append: bool,
        flush_every: usize,
    ) -> Result<Self> {
        let csv = CsvWriter::new(outfile, append, flush_every).await?;
        let dump = match dumpfile {
            Some(path) => Some(JsonLWriter::new(path, flush_every).await?),
            None => None,
        };
        Ok(Self { csv, dump })
    }
}

#[async_trait]
impl RecordSink for ExportSink {
    async fn write_record(&self, record: &ParsedRecord, origin: &str) -> Result<()> {
        self.csv.write_record(record, origin).await
    }

    async fn write_raw(&self, raw: &RawRecord) -> Result<()> {
        match self.dump {
            Some(ref dump) => dump.write_raw(raw).await,
            None => Ok(()),
        }
    }

    async fn finalize(&self) -> Result<()> {
        self.csv.finalize().await?;
        if let Some(ref dump) = self.dump {
            dump.finalize().await?;
        }
        Ok(())
    }

    async fn file_size(&self) -> Result<u64> {
        self.csv.file_size().await
    }
}

/// Helper function to open a buffered file writer
///
/// # Arguments
/// * `path` - File path to open
/// * `mode` - Truncate or append
pub(crate) async fn create_writer(path: &Path, mode: OpenMode) -> Result<BufWriter<File>> {
    validate_path(path)?;
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        OpenMode::Truncate => options.write(true).truncate(true),
        OpenMode::Append => options.append(true),
    };
    let file = options.open(path).await?;
    Ok(BufWriter::with_capacity(1024 * 1024, file))
}

/// Helper function to validate that the parent directory exists
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::InvalidValue {
                field: "output directory".to_string(),
                value: parent.display().to_string(),
            }
            .into());
        }
    }

    Ok(())
}
