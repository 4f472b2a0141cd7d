//! # prolog-console-core
//!
//! Core types for the Prolog query console.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other prolog-console crates. It provides:
//!
//! - Query types (QueryId, QueryMode, QueryResult)
//! - Key chords, console commands and platform key bindings
//! - Completion items offered to the editor
//! - Console configuration loaded from YAML
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other prolog-console crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod completion;
pub mod config;
pub mod error;
pub mod key;
pub mod platform;
pub mod query;

// Re-export commonly used types
pub use completion::{Completion, CompletionContext};
pub use config::{
    ChordSettings, CompletionSettings, ConsoleConfig, HistoryPersistence, HistorySettings, KeySettings,
    NamespaceSettings, QuerySettings, TrailingPeriodPolicy,
};
pub use error::{Error, Result};
pub use key::{ConsoleCommand, Key, KeyBinding, KeyChord, Modifiers};
pub use platform::Platform;
pub use query::{QueryId, QueryMode, QueryResult};
