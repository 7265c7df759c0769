//! Session controller tests
//!
//! Covers history continuity across stateless invocations, the text-only
//! façade, and connection lifecycle on every exit path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{DemoTools, ScriptedProvider, Step, call, demo_connection, dying_demo_connection, say};
use toolchat_core::config::LoopConfig;
use toolchat_core::history::{PlainEntry, parse_json, to_json};
use toolchat_core::session::{CANCELLED_MESSAGE, ChatSession, HISTORY_CLEARED_MESSAGE, NOT_CONNECTED_MESSAGE};
use toolchat_core::target::TargetRef;
use toolchat_core::turn::Role;

async fn connected_session(provider: Arc<ScriptedProvider>, tools: DemoTools) -> (ChatSession, common::Counters) {
    let (connection, counters) = demo_connection(tools).await;
    let mut session = ChatSession::new(provider, LoopConfig::default());
    session.attach(connection).await;
    (session, counters)
}

mod continuity_tests {
    use super::*;

    #[tokio::test]
    async fn test_second_invocation_sees_prior_turns() {
        // First invocation
        let first = Arc::new(ScriptedProvider::new(vec![say("hello")]));
        let (mut session, _) = connected_session(first, DemoTools::with_search_key()).await;
        let reply = session.process_query_with_history("hi", &[]).await;
        assert_eq!(reply, "hello");
        session.cleanup().await;

        // The caller keeps the plain record and serializes it
        let record = vec![PlainEntry::user("hi"), PlainEntry::assistant(reply)];
        let serialized = to_json(&record).unwrap();

        // Second, brand-new invocation
        let second = Arc::new(ScriptedProvider::new(vec![say("You said \"hi\".")]));
        let (mut session, _) = connected_session(second.clone(), DemoTools::with_search_key()).await;
        let history = parse_json(Some(&serialized));
        let reply = session.process_query_with_history("what did I just say?", &history).await;

        assert_eq!(reply, "You said \"hi\".");
        let seen = &second.seen()[0];
        assert_eq!(seen.len(), 3);
        assert_eq!((seen[0].role, seen[0].text()), (Role::User, Some("hi")));
        assert_eq!((seen[1].role, seen[1].text()), (Role::Assistant, Some("hello")));
        assert_eq!((seen[2].role, seen[2].text()), (Role::User, Some("what did I just say?")));
    }

    #[tokio::test]
    async fn test_corrupt_history_starts_fresh() {
        let provider = Arc::new(ScriptedProvider::new(vec![say("fresh start")]));
        let (mut session, _) = connected_session(provider.clone(), DemoTools::with_search_key()).await;

        let history = parse_json(Some("not json at all"));
        assert!(history.is_empty());

        let reply = session.process_query_with_history("hello", &history).await;
        assert_eq!(reply, "fresh start");
        assert_eq!(provider.seen()[0].len(), 1);
    }

    #[tokio::test]
    async fn test_session_keeps_its_own_turns() {
        let provider = Arc::new(ScriptedProvider::new(vec![say("one"), say("two")]));
        let (mut session, _) = connected_session(provider.clone(), DemoTools::with_search_key()).await;

        session.process_query("first").await;
        session.process_query("second").await;

        assert_eq!(session.turns().len(), 4);
        assert_eq!(provider.seen()[1].len(), 3);
    }

    #[tokio::test]
    async fn test_clear_keeps_connection() {
        let provider = Arc::new(ScriptedProvider::new(vec![say("one"), say("two")]));
        let (mut session, counters) = connected_session(provider.clone(), DemoTools::with_search_key()).await;

        session.process_query("first").await;
        assert_eq!(session.clear(), HISTORY_CLEARED_MESSAGE);
        assert!(session.turns().is_empty());
        assert!(session.is_connected());

        session.process_query("second").await;
        assert_eq!(provider.seen()[1].len(), 1);
        assert_eq!(counters.closes(), 0);
    }
}

mod facade_tests {
    use super::*;

    #[tokio::test]
    async fn test_not_connected_sentence() {
        let provider = Arc::new(ScriptedProvider::new(vec![say("unused")]));
        let mut session = ChatSession::new(provider.clone(), LoopConfig::default());

        assert_eq!(session.process_query("hello").await, NOT_CONNECTED_MESSAGE);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_becomes_sentence() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail("invalid API key".into())]));
        let (mut session, _) = connected_session(provider, DemoTools::with_search_key()).await;

        let reply = session.process_query("hello").await;
        assert_eq!(reply, "Error processing query: Provider error: invalid API key");
        // Nothing from the failed query is committed
        assert!(session.turns().is_empty());
    }

    #[tokio::test]
    async fn test_tool_failure_still_answers() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            call("c1", "websearch", json!({"query": "rust"})),
            say("Sorry, the search tool is missing an API key."),
        ]));
        let (mut session, _) = connected_session(provider, DemoTools::without_search_key()).await;

        let reply = session.process_query("search for rust").await;
        assert_eq!(reply, "Sorry, the search tool is missing an API key.");
    }

    #[tokio::test]
    async fn test_switch_to_unreachable_target() {
        let provider = Arc::new(ScriptedProvider::new(vec![say("one")]));
        let (mut session, counters) = connected_session(provider, DemoTools::with_search_key()).await;
        session.process_query("first").await;

        let notice = session
            .switch_target(&TargetRef::path("toolchat-no-such-server-binary"))
            .await;

        assert!(notice.starts_with("Error connecting to tool server:"));
        assert!(!session.is_connected());
        assert!(session.turns().is_empty());
        assert_eq!(counters.closes(), 1);
        assert_eq!(session.process_query("hello").await, NOT_CONNECTED_MESSAGE);
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_after_success_closes_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![say("4")]));
        let (mut session, counters) = connected_session(provider, DemoTools::with_search_key()).await;

        assert_eq!(session.process_query("2+2").await, "4");
        assert!(session.cleanup().await);
        assert!(!session.cleanup().await);
        assert_eq!(counters.closes(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_after_provider_error_closes_once() {
        let provider = Arc::new(ScriptedProvider::new(vec![Step::Fail("network down".into())]));
        let (mut session, counters) = connected_session(provider, DemoTools::with_search_key()).await;

        session.process_query("hello").await;
        session.cleanup().await;
        session.cleanup().await;
        assert_eq!(counters.closes(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_discards_round_and_cleans_up() {
        let provider = Arc::new(ScriptedProvider::hanging());
        let (mut session, counters) = connected_session(provider, DemoTools::with_search_key()).await;

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let reply = session.process_query_cancellable("hello", None, &token).await;

        assert_eq!(reply, CANCELLED_MESSAGE);
        assert!(session.turns().is_empty());
        assert!(!session.is_connected());
        assert_eq!(counters.closes(), 1);

        // A later cleanup is a no-op
        assert!(!session.cleanup().await);
        assert_eq!(counters.closes(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_during_tool_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            call("c1", "slow_lookup", json!({})),
            say("unreachable"),
        ]));
        let tools = DemoTools::with_search_key().with_stalling_tool();
        let (mut session, counters) = connected_session(provider.clone(), tools).await;

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let reply = session.process_query_cancellable("look it up", None, &token).await;

        assert_eq!(reply, CANCELLED_MESSAGE);
        // The call reached the server and the model was asked only once
        assert_eq!(counters.tool_calls(), 1);
        assert_eq!(provider.call_count(), 1);
        assert!(session.turns().is_empty());
        assert!(!session.is_connected());
        assert_eq!(counters.closes(), 1);

        assert!(!session.cleanup().await);
        assert_eq!(counters.closes(), 1);
    }

    #[tokio::test]
    async fn test_lost_server_reports_connection_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            call("c1", "websearch", json!({"query": "rust"})),
            say("Sorry, the search failed."),
        ]));
        let (connection, counters) = dying_demo_connection(DemoTools::with_search_key()).await;
        let mut session = ChatSession::new(provider.clone(), LoopConfig::default());
        session.attach(connection).await;

        let reply = session.process_query("search for rust").await;

        assert!(reply.starts_with("Error connecting to tool server: Lost connection to 'demo'"));
        assert!(!session.is_connected());
        assert!(session.turns().is_empty());
        assert_eq!(provider.call_count(), 1);

        // Later queries don't write to the dead server
        assert_eq!(session.process_query("again").await, NOT_CONNECTED_MESSAGE);
        assert_eq!(counters.tool_calls(), 1);

        session.cleanup().await;
        assert_eq!(counters.closes(), 1);
    }

    #[tokio::test]
    async fn test_uncancelled_query_completes() {
        let provider = Arc::new(ScriptedProvider::new(vec![say("done")]));
        let (mut session, counters) = connected_session(provider, DemoTools::with_search_key()).await;

        let token = CancellationToken::new();
        let reply = session.process_query_cancellable("go", None, &token).await;
        assert_eq!(reply, "done");
        assert!(session.is_connected());
        assert_eq!(counters.closes(), 0);
    }

    #[tokio::test]
    async fn test_attach_replaces_and_closes_previous() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let (mut session, first) = connected_session(provider, DemoTools::with_search_key()).await;

        let (replacement, second) = demo_connection(DemoTools::with_search_key()).await;
        session.attach(replacement).await;

        assert_eq!(first.closes(), 1);
        assert_eq!(second.closes(), 0);
        assert!(session.is_connected());
    }
}
