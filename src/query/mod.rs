//! Search query construction
//!
//! Each lookup mode maps to one Elasticsearch query clause. The clause is
//! shared by the count request and the scroll request so the progress total
//! and the exported records come from the same filter.

use serde_json::{Value, json};

use crate::error::{QueryError, Result};

/// How records are looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMode {
    /// Exact email address
    Email(String),

    /// Every email under a domain
    Domain(String),

    /// Exact password
    Password(String),

    /// Raw query clause supplied by the user as JSON
    Raw(String),
}

impl LookupMode {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            LookupMode::Email(_) => "email",
            LookupMode::Domain(_) => "domain",
            LookupMode::Password(_) => "pass",
            LookupMode::Raw(_) => "raw",
        }
    }

    /// Build the query clause for this lookup
    ///
    /// # Returns
    /// * `Result<Value>` - Query clause to place under `"query"`
    pub fn to_query(&self) -> Result<Value> {
        let query = match self {
            LookupMode::Email(email) => {
                query_string(format!("email:\"{}\"", escape_phrase(email)), false)
            }
            LookupMode::Domain(domain) => {
                query_string(format!("email:\"*@{}\"", escape_phrase(domain)), true)
            }
            LookupMode::Password(pass) => {
                query_string(format!("password:\"{}\"", escape_phrase(pass)), false)
            }
            LookupMode::Raw(raw) => {
                let value: Value = serde_json::from_str(raw)
                    .map_err(|e| QueryError::InvalidRawQuery(e.to_string()))?;
                if !value.is_object() {
                    return Err(
                        QueryError::InvalidRawQuery("query must be a JSON object".into()).into(),
                    );
                }
                value
            }
        };
        Ok(query)
    }
}

fn query_string(query: String, analyze_wildcard: bool) -> Value {
    let mut inner = json!({ "query": query });
    if analyze_wildcard {
        inner["analyze_wildcard"] = Value::Bool(true);
    }
    json!({ "bool": { "must": [ { "query_string": inner } ] } })
}

/// Escape characters that would terminate a quoted query_string phrase
fn escape_phrase(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
