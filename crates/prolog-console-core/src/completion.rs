//! Completion items offered to the editor.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Completion {
    /// Text shown in the completion popup
    pub label: String,
    /// Text inserted when the candidate is accepted
    pub value: String,
    /// Relevance; higher sorts first
    pub score: i32,
    /// Short tag naming the source, e.g. "pl"
    pub source_tag: String,
}

impl Completion {
    /// Candidate whose label and inserted value are the same.
    pub fn new(name: impl Into<String>, score: i32, source_tag: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            value: name,
            score,
            source_tag: source_tag.into(),
        }
    }
}

/// Where in the editor completion was requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CompletionContext {
    /// Zero-based line of the caret
    pub line: usize,
    /// Zero-based column of the caret
    pub column: usize,
    /// Full text of the caret line
    pub line_text: String,
}

impl CompletionContext {
    /// Context for a caret at `line`/`column`.
    pub fn new(line: usize, column: usize, line_text: impl Into<String>) -> Self {
        Self {
            line,
            column,
            line_text: line_text.into(),
        }
    }
}
