//! Record projection and filtering
//!
//! Workers decode each raw document into the two fields written to the CSV
//! file and tag it with the index it came from.

use serde::Deserialize;

use crate::error::ExportError;

/// Prefix stripped from index names to form the origin tag
pub const INDEX_PREFIX: &str = "leak_";

/// Identifier value the backend uses for missing data
pub const NULL_SENTINEL: &str = "null";

/// The email/password projection of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ParsedRecord {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ParsedRecord {
    /// Decode a raw `_source` document
    ///
    /// Missing or `null` fields decode as empty strings. Anything that is not
    /// an object with string fields is a parse error.
    pub fn parse(source: &str) -> std::result::Result<Self, ExportError> {
        serde_json::from_str(source).map_err(|e| ExportError::Parse(format!("{e}: {source}")))
    }

    /// Whether the record may be written
    pub fn is_accepted(&self) -> bool {
        !self.email.is_empty() && self.email != NULL_SENTINEL
    }
}

/// Derive the origin tag from an index name
///
/// Only the first occurrence of the prefix is removed, so `leak_linkedin`
/// becomes `linkedin`.
pub fn origin_tag(index: &str) -> String {
    index.replacen(INDEX_PREFIX, "", 1)
}
