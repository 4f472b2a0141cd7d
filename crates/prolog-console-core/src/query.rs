//! Query types exchanged with the remote Prolog service.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Opaque identifier assigned to a query by the remote client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct QueryId(String);

impl QueryId {
    /// Wrap an identifier handed out by the query client.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for QueryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for QueryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the service should deliver solutions for an evaluated query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Collect every solution and answer once
    All,
    /// Answer one solution at a time, on demand
    Incremental,
}

/// A single answer delivered by the service for an evaluated query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryResult {
    /// One solution with its variable bindings
    Solution {
        /// Variable name to bound value
        #[serde(default)]
        bindings: BTreeMap<String, serde_json::Value>,
        /// Textual rendering of the solution, when the service provides one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// The query has no (more) solutions
    Exhausted,
    /// The query raised an error
    Error {
        /// Error message reported by the service
        message: String,
    },
}

impl QueryResult {
    /// Build a solution from `(variable, value)` pairs.
    pub fn solution<I, K>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        QueryResult::Solution {
            bindings: bindings.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            text: None,
        }
    }

    /// Build a solution carrying only a textual rendering.
    pub fn text(text: impl Into<String>) -> Self {
        QueryResult::Solution {
            bindings: BTreeMap::new(),
            text: Some(text.into()),
        }
    }

    /// Build an error result.
    pub fn error(message: impl Into<String>) -> Self {
        QueryResult::Error {
            message: message.into(),
        }
    }

    /// Whether this result carries a solution.
    pub fn is_solution(&self) -> bool {
        matches!(self, QueryResult::Solution { .. })
    }

    /// Whether no further results will follow for the query.
    pub fn is_terminal(&self) -> bool {
        !self.is_solution()
    }

    /// Get the value bound to `variable`, if any.
    pub fn binding(&self, variable: &str) -> Option<&serde_json::Value> {
        match self {
            QueryResult::Solution { bindings, .. } => bindings.get(variable),
            _ => None,
        }
    }

    /// Get the value bound to `variable` when it is a string.
    pub fn binding_str(&self, variable: &str) -> Option<&str> {
        self.binding(variable).and_then(|v| v.as_str())
    }

    /// Get the textual rendering of a solution.
    pub fn solution_text(&self) -> Option<&str> {
        match self {
            QueryResult::Solution { text, .. } => text.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_id_display() {
        let id = QueryId::new("qid_42");
        assert_eq!(id.to_string(), "qid_42");
        assert_eq!(id.as_str(), "qid_42");
        assert_eq!(QueryId::from("qid_42"), id);
    }

    #[test]
    fn test_solution_bindings() {
        let result = QueryResult::solution([("Q", json!("member(X, [1,2])"))]);
        assert!(result.is_solution());
        assert!(!result.is_terminal());
        assert_eq!(result.binding_str("Q"), Some("member(X, [1,2])"));
        assert_eq!(result.binding("Missing"), None);
    }

    #[test]
    fn test_terminal_results() {
        assert!(QueryResult::Exhausted.is_terminal());
        assert!(QueryResult::error("timeout").is_terminal());
        assert_eq!(QueryResult::Exhausted.binding("X"), None);
    }

    #[test]
    fn test_solution_text() {
        let result = QueryResult::text("L = [a,b]");
        assert_eq!(result.solution_text(), Some("L = [a,b]"));
        assert_eq!(QueryResult::Exhausted.solution_text(), None);
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(QueryResult::solution([("X", json!(1))])).unwrap();
        assert_eq!(json["status"], "solution");
        assert_eq!(json["bindings"]["X"], 1);

        let parsed: QueryResult =
            serde_json::from_str(r#"{"status":"error","message":"boom"}"#).unwrap();
        assert_eq!(parsed, QueryResult::error("boom"));

        let exhausted: QueryResult = serde_json::from_str(r#"{"status":"exhausted"}"#).unwrap();
        assert_eq!(exhausted, QueryResult::Exhausted);
    }

    #[test]
    fn test_query_mode_serialization() {
        assert_eq!(
            serde_json::to_string(&QueryMode::Incremental).unwrap(),
            "\"incremental\""
        );
    }
}
