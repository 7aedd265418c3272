use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::LookupError;

/// Database collaborator behind `db_equals` / `db_contains` assertions.
///
/// The evaluator consumes only the first column of the first row, so the
/// contract is a single value per query.
#[async_trait]
pub trait DatabaseLookup: Send + Sync {
    /// Run `query` and return the first column of the single returned row.
    async fn query_first(&self, query: &str) -> std::result::Result<Value, LookupError>;
}

/// Canned query results, keyed by exact query text. Stands in for a real
/// database connection in tests and local runs.
#[derive(Debug, Default)]
pub struct FixtureLookup {
    rows: HashMap<String, Value>,
}

impl FixtureLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(mut self, query: &str, value: Value) -> Self {
        self.rows.insert(query.to_string(), value);
        self
    }
}

#[async_trait]
impl DatabaseLookup for FixtureLookup {
    async fn query_first(&self, query: &str) -> std::result::Result<Value, LookupError> {
        self.rows
            .get(query)
            .cloned()
            .ok_or_else(|| LookupError::EmptyResult(query.to_string()))
    }
}
