use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Externally visible resource envelope: `{id, revision, content}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub id: Option<String>,
    pub revision: Option<String>,
    pub content: Value,
}

impl ResourceResponse {
    pub fn new(id: Option<String>, revision: Option<String>, content: Value) -> Self {
        Self { id, revision, content }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub content: Value,
}

impl ActionResponse {
    pub fn new(content: Value) -> Self {
        Self { content }
    }
}

/// Completion record of a streamed query. Counts are `-1` when unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub paged_results_cookie: Option<String>,
    pub total_paged_results: i64,
    pub remaining_paged_results: i64,
}

impl Default for QueryResponse {
    fn default() -> Self {
        Self {
            paged_results_cookie: None,
            total_paged_results: -1,
            remaining_paged_results: -1,
        }
    }
}
