//! JSON Lines writer for export operations
//!
//! Dumps every raw document received from the backend, one per line. The
//! file is always opened in append mode and has no header.

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::export::streaming::RawRecord;

use super::{LineWriter, OpenMode};

/// Writer for JSON Lines format
pub struct JsonLWriter {
    lines: LineWriter,
}

impl JsonLWriter {
    /// Create a new JSON Lines writer
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `flush_every` - Flush after this many documents
    pub async fn new(path: &Path, flush_every: usize) -> Result<Self> {
        let lines = LineWriter::open(path, OpenMode::Append, flush_every).await?;
        debug!("Created JSON Lines writer for: {}", path.display());
        Ok(Self { lines })
    }

    /// Write one raw document
    ///
    /// Documents from the backend are single-line JSON already; any embedded
    /// line breaks are folded so the output stays one document per line.
    pub async fn write_raw(&self, raw: &RawRecord) -> Result<()> {
        if raw.source.contains('\n') || raw.source.contains('\r') {
            let folded = raw.source.replace(['\r', '\n'], " ");
            self.lines.append_line(&folded).await
        } else {
            self.lines.append_line(&raw.source).await
        }
    }

    pub async fn finalize(&self) -> Result<()> {
        self.lines.flush().await?;
        debug!(
            "Finalized JSON Lines file: {} ({} documents)",
            self.lines.path().display(),
            self.lines.lines_written().await
        );
        Ok(())
    }
}
