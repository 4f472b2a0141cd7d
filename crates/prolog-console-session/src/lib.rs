//! # prolog-console-session
//!
//! Query session lifecycle management for the Prolog query console.
//!
//! This crate provides:
//! - Collaborator traits for the query client, editor and observers
//! - The single active query session and its manager
//! - History cursor navigation over pluggable history stores
//! - Predicate-name completion and per-console completion registries
//! - Namespace prefix map with a cancellable refresh task
//! - Scripted collaborators for tests
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on prolog-console-core
//! and only talks to the outside world through the traits in [`client`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod completion;
pub mod history;
pub mod manager;
pub mod namespace;
pub mod session;
pub mod testing;

// Re-export commonly used types
pub use client::{
    ConsoleObserver, Editor, NoopObserver, QueryClient, QueryHandle, ResultCallback,
};
pub use completion::{
    identifier_prefix, parse_predicate_names, CompletionRegistry, CompletionSource,
    NameCacheState, PredicateNameCache,
};
pub use history::{
    quote_atom, unquote_atom, DisabledHistoryStore, HistoryCallback, HistoryCursor,
    HistoryNavigator, HistoryStore, InMemoryHistoryStore, RemoteHistoryStore,
};
pub use manager::QuerySessionManager;
pub use namespace::{parse_prefix_pairs, NamespacePrefixMap, NamespaceRefresher};
pub use session::QuerySession;
