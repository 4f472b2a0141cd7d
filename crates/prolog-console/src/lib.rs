//! # Prolog Console
//!
//! Interactive Prolog query console for embedding in an editor.
//!
//! ## Overview
//!
//! A console provides:
//! - Query submission with incremental solution stepping
//! - History navigation (server-side, in-memory or disabled)
//! - Predicate-name completion
//! - A namespace prefix map refreshed in the background
//!
//! ## Architecture
//!
//! This is Layer 1 - the console facade that ties together:
//! - prolog-console-core: Core types and configuration
//! - prolog-console-session: Session lifecycle, history and completion

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod console;
pub mod logging;

// Re-export commonly used types
pub use console::{PrologConsole, PrologConsoleBuilder};
pub use logging::init_logging;
pub use prolog_console_core::{
    Completion, CompletionContext, ConsoleCommand, ConsoleConfig, Error, KeyChord, Platform,
    QueryId, QueryResult, Result,
};
pub use prolog_console_session::{ConsoleObserver, Editor, HistoryStore, QueryClient, QueryHandle};
