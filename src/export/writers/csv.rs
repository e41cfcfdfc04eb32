//! CSV writer for export operations
//!
//! Writes one `email,password,breach_name` row per accepted record, with a
//! header line first and proper value escaping.

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::export::record::ParsedRecord;

use super::{LineWriter, OpenMode};

/// Header line of the CSV output
pub const CSV_HEADER: &str = "email,password,breach_name";

/// Writer for CSV format
pub struct CsvWriter {
    lines: LineWriter,
}

impl CsvWriter {
    /// Create a new CSV writer
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `append` - Keep existing rows; the header is only written to an empty file
    /// * `flush_every` - Flush after this many rows
    ///
    /// # Returns
    /// * `Result<Self>` - New writer instance or error
    pub async fn new(path: &Path, append: bool, flush_every: usize) -> Result<Self> {
        let has_content = append
            && tokio::fs::metadata(path)
                .await
                .map(|m| m.len() > 0)
                .unwrap_or(false);
        let mode = if append {
            OpenMode::Append
        } else {
            OpenMode::Truncate
        };

        let lines = LineWriter::open(path, mode, flush_every).await?;
        if !has_content {
            lines.append_line(CSV_HEADER).await?;
        }

        debug!(
            "Created CSV writer for: {} ({:?}, header {})",
            path.display(),
            mode,
            if has_content { "kept" } else { "written" }
        );

        Ok(Self { lines })
    }

    /// Write a single record as a CSV row
    pub async fn write_record(&self, record: &ParsedRecord, origin: &str) -> Result<()> {
        self.lines.append_line(&Self::format_row(record, origin)).await
    }

    pub async fn finalize(&self) -> Result<()> {
        self.lines.flush().await?;
        debug!("Finalized CSV file: {}", self.lines.path().display());
        Ok(())
    }

    pub async fn file_size(&self) -> Result<u64> {
        self.lines.file_size().await
    }

    fn format_row(record: &ParsedRecord, origin: &str) -> String {
        format!(
            "{},{},{}",
            Self::escape_csv_value(&record.email),
            Self::escape_csv_value(&record.password),
            Self::escape_csv_value(origin)
        )
    }

    /// Escape a CSV value if necessary
    ///
    /// # Arguments
    /// * `value` - Value to escape
    ///
    /// # Returns
    /// * `String` - Escaped value
    fn escape_csv_value(value: &str) -> String {
        if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
            // Wrap in quotes and escape internal quotes by doubling them
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::fs;

    fn record(email: &str, password: &str) -> ParsedRecord {
        ParsedRecord {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_csv_writer_basic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let writer = CsvWriter::new(&path, false, 100).await.unwrap();

        writer.write_record(&record("a@x.com", "pw1"), "linkedin").await.unwrap();
        writer.write_record(&record("b@x.com", "pw2"), "adobe").await.unwrap();
        writer.finalize().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![CSV_HEADER, "a@x.com,pw1,linkedin", "b@x.com,pw2,adobe"]
        );
    }

    #[tokio::test]
    async fn test_csv_writer_with_special_characters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("special.csv");
        let writer = CsvWriter::new(&path, false, 100).await.unwrap();

        writer.write_record(&record("a@x.com", "pa,ss"), "x").await.unwrap();
        writer.write_record(&record("b@x.com", "say \"hi\""), "x").await.unwrap();
        writer.finalize().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("a@x.com,\"pa,ss\",x"));
        assert!(content.contains("b@x.com,\"say \"\"hi\"\"\",x"));
    }

    #[tokio::test]
    async fn test_truncate_replaces_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rerun.csv");
        fs::write(&path, "stale\n").await.unwrap();

        let writer = CsvWriter::new(&path, false, 100).await.unwrap();
        writer.write_record(&record("a@x.com", "pw"), "x").await.unwrap();
        writer.finalize().await.unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, format!("{CSV_HEADER}\na@x.com,pw,x\n"));
    }

    #[tokio::test]
    async fn test_append_keeps_rows_and_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("append.csv");

        for email in ["a@x.com", "b@x.com"] {
            let writer = CsvWriter::new(&path, true, 100).await.unwrap();
            writer.write_record(&record(email, "pw"), "x").await.unwrap();
            writer.finalize().await.unwrap();
        }

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.matches(CSV_HEADER).count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_csv_escape_value() {
        assert_eq!(CsvWriter::escape_csv_value("simple"), "simple");
        assert_eq!(CsvWriter::escape_csv_value("with,comma"), "\"with,comma\"");
        assert_eq!(CsvWriter::escape_csv_value("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(CsvWriter::escape_csv_value("with\nnewline"), "\"with\nnewline\"");
    }
}
