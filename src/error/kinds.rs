use std::{fmt, io};

use crate::error::elastic::ErrorResponse;

/// Crate-wide `Result` type using [`HoarddError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, HoarddError>;

/// Top-level error type for hoardd operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum HoarddError {
    /// Connection-related errors.
    Connection(ConnectionError),

    /// Configuration and argument errors.
    Config(ConfigError),

    /// Query construction or count errors.
    Query(QueryError),

    /// Fatal export pipeline errors.
    Export(ExportError),

    /// Error responses returned by the search backend.
    Backend(ErrorResponse),

    /// I/O errors.
    Io(io::Error),

    /// HTTP transport errors.
    Http(reqwest::Error),

    /// JSON encoding or decoding errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// Failed to establish a connection after all retry attempts.
    ConnectionFailed(String),

    /// Invalid endpoint URL.
    InvalidUrl(String),

    /// Cluster reported an unusable health status.
    ClusterUnhealthy(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// No lookup mode was supplied.
    MissingLookup,

    /// More than one lookup mode was supplied.
    ConflictingLookups(Vec<&'static str>),
}

/// Query-specific errors.
#[derive(Debug)]
pub enum QueryError {
    /// Raw query is not valid JSON.
    InvalidRawQuery(String),

    /// The count query matched nothing.
    NoResults,
}

/// Fatal errors raised inside the export pipeline.
///
/// Limit and cancellation are not errors; they are reported through
/// [`crate::export::ExportOutcome`].
#[derive(Debug, Clone)]
pub enum ExportError {
    /// A page could not be retrieved from the backend.
    Fetch(String),

    /// A record could not be decoded into the email/password shape.
    Parse(String),

    /// An output stream failed.
    Write(String),

    /// A pipeline task panicked or was aborted.
    Task(String),
}

impl ExportError {
    /// Short name of the failure kind, used in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::Fetch(_) => "fetch",
            ExportError::Parse(_) => "parse",
            ExportError::Write(_) => "write",
            ExportError::Task(_) => "task",
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for HoarddError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoarddError::Connection(e) => write!(f, "Connection error: {e}"),
            HoarddError::Config(e) => write!(f, "Configuration error: {e}"),
            HoarddError::Query(e) => write!(f, "Query error: {e}"),
            HoarddError::Export(e) => write!(f, "Export failed: {e}"),
            HoarddError::Backend(e) => write!(f, "{e}"),
            HoarddError::Io(e) => write!(f, "I/O error: {e}"),
            HoarddError::Http(e) => write!(f, "HTTP error: {e}"),
            HoarddError::Json(e) => write!(f, "JSON error: {e}"),
            HoarddError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectionFailed(msg) => write!(f, "Failed to connect: {msg}"),
            ConnectionError::InvalidUrl(url) => write!(f, "Invalid url parameter: {url}"),
            ConnectionError::ClusterUnhealthy(status) => {
                write!(f, "Cluster health is {status}, exiting. Contact support.")
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required {field} parameter"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::MissingLookup => write!(
                f,
                "an argument for one of the following parameters must be supplied: email, domain, pass, or raw"
            ),
            ConfigError::ConflictingLookups(names) => write!(
                f,
                "{} parameters are mutually exclusive, only one can receive a value",
                names.join(", ")
            ),
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidRawQuery(msg) => write!(f, "Invalid raw query: {msg}"),
            QueryError::NoResults => write!(f, "0 results returned, check your query"),
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Fetch(msg) => write!(f, "Fetch error: {msg}"),
            ExportError::Parse(msg) => write!(f, "Parse error: {msg}"),
            ExportError::Write(msg) => write!(f, "Write error: {msg}"),
            ExportError::Task(msg) => write!(f, "Task error: {msg}"),
        }
    }
}

impl std::error::Error for HoarddError {}
impl std::error::Error for ConnectionError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for QueryError {}
impl std::error::Error for ExportError {}

/* ========================= Conversions to HoarddError ========================= */

impl From<io::Error> for HoarddError {
    fn from(err: io::Error) -> Self {
        HoarddError::Io(err)
    }
}

impl From<reqwest::Error> for HoarddError {
    fn from(err: reqwest::Error) -> Self {
        HoarddError::Http(err)
    }
}

impl From<serde_json::Error> for HoarddError {
    fn from(err: serde_json::Error) -> Self {
        HoarddError::Json(err)
    }
}

impl From<ErrorResponse> for HoarddError {
    fn from(err: ErrorResponse) -> Self {
        HoarddError::Backend(err)
    }
}

impl From<ConnectionError> for HoarddError {
    fn from(err: ConnectionError) -> Self {
        HoarddError::Connection(err)
    }
}

impl From<ConfigError> for HoarddError {
    fn from(err: ConfigError) -> Self {
        HoarddError::Config(err)
    }
}

impl From<QueryError> for HoarddError {
    fn from(err: QueryError) -> Self {
        HoarddError::Query(err)
    }
}

impl From<ExportError> for HoarddError {
    fn from(err: ExportError) -> Self {
        HoarddError::Export(err)
    }
}

impl From<String> for HoarddError {
    fn from(msg: String) -> Self {
        HoarddError::Generic(msg)
    }
}

impl From<&str> for HoarddError {
    fn from(msg: &str) -> Self {
        HoarddError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_error_kind() {
        assert_eq!(ExportError::Fetch("x".into()).kind(), "fetch");
        assert_eq!(ExportError::Parse("x".into()).kind(), "parse");
        assert_eq!(ExportError::Write("x".into()).kind(), "write");
    }

    #[test]
    fn test_conflicting_lookups_message() {
        let err: HoarddError = ConfigError::ConflictingLookups(vec!["email", "domain"]).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: email, domain parameters are mutually exclusive, only one can receive a value"
        );
    }
}
