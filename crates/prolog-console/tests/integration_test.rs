//! Integration tests for the prolog-console facade.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use prolog_console::{
    CompletionContext, ConsoleCommand, ConsoleConfig, Editor, KeyChord, Platform, PrologConsole,
    QueryResult,
};
use prolog_console_core::{HistoryPersistence, Key, TrailingPeriodPolicy};
use prolog_console_session::testing::{RecordingEditor, RecordingObserver, ScriptedClient};
use prolog_console_session::InMemoryHistoryStore;

fn memory_config() -> ConsoleConfig {
    let mut config = ConsoleConfig::default();
    config.history.persistence = HistoryPersistence::Memory;
    config
}

#[test]
fn test_full_query_cycle_through_keys() {
    let client = Arc::new(ScriptedClient::new());
    let editor = Arc::new(RecordingEditor::new());
    let observer = Arc::new(RecordingObserver::new());
    let mut console = PrologConsole::builder(client.clone(), editor.clone())
        .observer(observer.clone())
        .config(memory_config())
        .platform(Platform::Linux)
        .build()
        .unwrap();
    console.init().unwrap();

    // Submit with Ctrl-Enter
    editor.type_text("member(X, [a, b]).");
    assert!(console.handle_key(&KeyChord::ctrl(Key::Enter)));
    let id = console.manager().active_query_id().unwrap();
    let handle = client.last_handle().unwrap();
    assert_eq!(handle.query().as_deref(), Some("member(X, [a, b])"));
    assert_eq!(editor.text(), "");

    handle.deliver(QueryResult::solution([("X", json!("a"))]));

    // Next solution with Ctrl-;
    assert!(console.handle_key(&KeyChord::ctrl(Key::Char(';'))));
    handle.deliver(QueryResult::solution([("X", json!("b"))]));
    handle.deliver(QueryResult::Exhausted);

    assert_eq!(observer.answers_for(&id).len(), 3);
    assert_eq!(observer.finished(), vec![id]);

    // Recall it with Up
    assert!(console.handle_key(&KeyChord::plain(Key::Up)));
    assert_eq!(editor.text(), "member(X, [a, b]).");

    // No newer entry: Down does nothing
    assert!(console.handle_key(&KeyChord::plain(Key::Down)));
    assert_eq!(editor.text(), "member(X, [a, b]).");
    assert_eq!(client.created(), 1);
}

#[test]
fn test_consoles_are_isolated() {
    let client = Arc::new(ScriptedClient::new());
    client.reply_to("findall(X", QueryResult::text("L = [\nX = append\n]."));

    let first_editor = Arc::new(RecordingEditor::new());
    let second_editor = Arc::new(RecordingEditor::new());
    let mut first = PrologConsole::builder(client.clone(), first_editor.clone())
        .config(memory_config())
        .build()
        .unwrap();
    let mut second = PrologConsole::builder(client.clone(), second_editor.clone())
        .config(memory_config())
        .build()
        .unwrap();
    first.init().unwrap();
    second.init().unwrap();

    let a = first.submit_query(Some("a.")).unwrap();
    let b = second.submit_query(Some("b.")).unwrap();

    // One console's submission does not supersede the other's
    assert_eq!(first.manager().active_query_id(), Some(a));
    assert_eq!(second.manager().active_query_id(), Some(b));
    assert_eq!(client.outstanding(), 2);

    // Each console enumerates names for its own registry
    let ctx = CompletionContext::new(0, 2, "ap");
    assert_eq!(first.completions_at(&ctx).len(), 1);
    assert_eq!(second.completions_at(&ctx).len(), 1);
    assert_eq!(client.handles_for("findall(X").len(), 2);

    // Separate histories
    first.execute(ConsoleCommand::HistoryNext);
    assert_eq!(first_editor.text(), "a.");
    assert_eq!(second_editor.text(), "");
}

#[test]
fn test_custom_history_store_and_policy() {
    let client = Arc::new(ScriptedClient::new());
    let editor = Arc::new(RecordingEditor::new());
    let store = Arc::new(InMemoryHistoryStore::new());
    let mut config = memory_config();
    config.query.trailing_period = TrailingPeriodPolicy::RequireTerminator;

    let console = PrologConsole::builder(client.clone(), editor.clone())
        .history_store(store.clone())
        .config(config)
        .build()
        .unwrap();

    assert!(console.submit_query(Some("foo(X)")).is_none());
    assert!(console.submit_query(Some("foo(X).")).is_some());
    assert_eq!(store.len(), 1);
    assert_eq!(client.created(), 1);
}

#[test]
fn test_config_file_loading() {
    let path = std::env::temp_dir().join(format!(
        "prolog-console-config-{}.yaml",
        std::process::id()
    ));
    std::fs::write(
        &path,
        "query:\n  trailing_period: require_terminator\nhistory:\n  persistence: disabled\nkeys:\n  submit_query:\n    win: Alt-Enter\n    mac: Command-Enter\n",
    )
    .unwrap();

    let client = Arc::new(ScriptedClient::new());
    let editor = Arc::new(RecordingEditor::new());
    let console = PrologConsole::builder(client, editor)
        .config_file(&path)
        .unwrap()
        .platform(Platform::Windows)
        .build()
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(
        console.config().query.trailing_period,
        TrailingPeriodPolicy::RequireTerminator
    );
    assert_eq!(
        console.command_for(&KeyChord::parse("Alt-Enter").unwrap()),
        Some(ConsoleCommand::SubmitQuery)
    );
    assert_eq!(console.command_for(&KeyChord::ctrl(Key::Enter)), None);
}

#[test]
fn test_missing_config_file_has_context() {
    let client = Arc::new(ScriptedClient::new());
    let editor = Arc::new(RecordingEditor::new());
    let err = PrologConsole::builder(client, editor)
        .config_file("/nonexistent/prolog-console.yaml")
        .err()
        .unwrap();
    assert!(err.to_string().contains("/nonexistent/prolog-console.yaml"));
}

#[tokio::test]
async fn test_dispose_stops_refresher_and_session() {
    let client = Arc::new(ScriptedClient::new());
    client.reply_to(
        "findall([P,U]",
        QueryResult::solution([("L", json!([["ex", "http://example.org/"]]))]),
    );
    let mut config = memory_config();
    config.namespaces.enabled = true;
    config.namespaces.refresh_interval_ms = 10;

    let mut console = PrologConsole::builder(client.clone(), Arc::new(RecordingEditor::new()))
        .config(config)
        .build()
        .unwrap();
    console.init().unwrap();
    assert!(console.is_refreshing());

    tokio::time::timeout(Duration::from_secs(2), async {
        while console.namespaces().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        console.namespaces().abbreviate("http://example.org/alice").as_deref(),
        Some("ex:alice")
    );

    console.submit_query(Some("repeat."));
    console.dispose().await.unwrap();

    assert!(!console.is_refreshing());
    assert!(!console.manager().has_open_session());
    assert_eq!(client.outstanding(), 0);

    let created = client.created();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(client.created(), created);
}
