//! Error handling module for hoardd.
//!
//! This module provides:
//! - Application-specific error kinds (configuration, connection, query, export)
//! - Structured extraction of Elasticsearch error responses
//! - A crate-wide `Result` alias
//!
//! # Example
//!
//! ```rust,no_run
//! use hoardd::error::{ExportError, HoarddError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(ExportError::Fetch("scroll expired".to_string()).into())
//! }
//!
//! if let Err(HoarddError::Export(e)) = example_operation() {
//!     eprintln!("failed with {}", e.kind());
//! }
//! ```

pub mod elastic;
pub mod kinds;

// Re-export commonly used types
pub use elastic::{ErrorInfo, ErrorResponse};
pub use kinds::{ConfigError, ConnectionError, ExportError, HoarddError, QueryError, Result};
