//! Property-based tests for the session manager and history quoting.
//!
//! Uses proptest to drive random command sequences and verify invariants.

use proptest::prelude::*;
use std::sync::Arc;

use prolog_console_core::{QueryResult, TrailingPeriodPolicy};
use prolog_console_session::testing::{RecordingEditor, RecordingObserver, ScriptedClient};
use prolog_console_session::{
    quote_atom, unquote_atom, DisabledHistoryStore, HistoryNavigator, QuerySessionManager,
};

/// One user or service action.
#[derive(Debug, Clone)]
enum Step {
    Submit(String),
    Next,
    Terminate,
    DeliverSolution,
    DeliverExhausted,
    DeliverError,
    Disconnect,
    Reconnect,
}

/// Generate a goal, with or without the trailing period.
fn goal() -> impl Strategy<Value = String> {
    ("[a-z][a-z_]{0,8}", any::<bool>()).prop_map(|(name, period)| {
        if period {
            format!("{name}(X).")
        } else {
            format!("{name}(X)")
        }
    })
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => goal().prop_map(Step::Submit),
        2 => Just(Step::Next),
        1 => Just(Step::Terminate),
        2 => Just(Step::DeliverSolution),
        1 => Just(Step::DeliverExhausted),
        1 => Just(Step::DeliverError),
        1 => Just(Step::Disconnect),
        1 => Just(Step::Reconnect),
    ]
}

fn manager(client: &Arc<ScriptedClient>, policy: TrailingPeriodPolicy) -> QuerySessionManager {
    let editor = Arc::new(RecordingEditor::new());
    let history = Arc::new(HistoryNavigator::new(
        Arc::new(DisabledHistoryStore),
        editor.clone(),
    ));
    QuerySessionManager::new(
        client.clone(),
        editor,
        Arc::new(RecordingObserver::new()),
        history,
        policy,
    )
}

proptest! {
    /// No sequence of actions leaves more than one handle unreleased.
    #[test]
    fn at_most_one_outstanding_session(
        steps in prop::collection::vec(step(), 1..40),
        require_terminator in any::<bool>(),
    ) {
        let policy = if require_terminator {
            TrailingPeriodPolicy::RequireTerminator
        } else {
            TrailingPeriodPolicy::Strip
        };
        let client = Arc::new(ScriptedClient::new());
        let manager = manager(&client, policy);

        for step in steps {
            match step {
                Step::Submit(goal) => {
                    manager.submit_query(Some(&goal));
                }
                Step::Next => manager.request_next_solution(),
                Step::Terminate => manager.terminate(),
                Step::DeliverSolution => {
                    if let Some(handle) = client.last_handle() {
                        handle.deliver(QueryResult::text("X = 1"));
                    }
                }
                Step::DeliverExhausted => {
                    if let Some(handle) = client.last_handle() {
                        handle.deliver(QueryResult::Exhausted);
                    }
                }
                Step::DeliverError => {
                    if let Some(handle) = client.last_handle() {
                        handle.deliver(QueryResult::error("boom"));
                    }
                }
                Step::Disconnect => client.set_connected(false),
                Step::Reconnect => client.set_connected(true),
            }

            prop_assert!(client.outstanding() <= 1);
            prop_assert_eq!(client.outstanding() == 1, manager.active_query_id().is_some());
            for handle in client.handles() {
                prop_assert!(handle.release_count() <= 1);
            }
        }

        drop(manager);
        prop_assert_eq!(client.outstanding(), 0);
    }

    /// The trailing period never changes what is sent under the strip policy.
    #[test]
    fn trailing_period_is_optional(name in "[a-z][a-z0-9_]{0,10}") {
        let client = Arc::new(ScriptedClient::new());
        let manager = manager(&client, TrailingPeriodPolicy::Strip);

        manager.submit_query(Some(&format!("{name}(X).")));
        manager.submit_query(Some(&format!("{name}(X)")));

        let queries: Vec<_> = client.handles().iter().map(|h| h.query()).collect();
        prop_assert_eq!(queries.len(), 2);
        prop_assert_eq!(&queries[0], &queries[1]);
    }

    /// Quoting survives quotes, backslashes and control characters.
    #[test]
    fn quote_round_trip(text in "[ -~\\n\\t]{0,40}") {
        let quoted = quote_atom(&text);
        prop_assert!(quoted.starts_with('\'') && quoted.ends_with('\''));
        prop_assert_eq!(unquote_atom(&quoted).unwrap(), text);
    }
}
