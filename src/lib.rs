//! hoardd library
//!
//! Core functionality for exporting credential records from leak indexes
//! stored in Elasticsearch. It can be embedded in other tools; the binary is
//! a thin wrapper around [`export::ExportCoordinator`].
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `connection`: Elasticsearch client and scroll backend
//! - `error`: Error types and handling
//! - `export`: Concurrent export pipeline and writers
//! - `query`: Lookup modes and query construction
//!
//! # Example
//!
//! ```no_run
//! use hoardd::{config::Config, connection::ElasticClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     let client = ElasticClient::connect(&config.connection).await?;
//!     let health = client.health_check().await?;
//!     println!("Cluster is {}", health.status);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod export;
pub mod query;

// Re-export commonly used types
pub use config::Config;
pub use connection::ElasticClient;
pub use error::{HoarddError, Result};
pub use export::{ExportCoordinator, ExportOutcome, ExportResult, PipelineOptions};
pub use query::LookupMode;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
