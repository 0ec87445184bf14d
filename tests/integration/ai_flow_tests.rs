// ============================
// tests/integration/ai_flow_tests.rs
// ============================
//! Assistant query, response and suggestion flows, driven through real
//! WebSocket connections against a scripted completion backend.

use std::sync::Arc;
use std::time::Duration;

use backend_lib::ai::backend::CompletionBackend;
use backend_lib::ai::mock::{MockBackend, MockReply};
use backend_lib::config::Settings;
use backend_lib::error::AppError;
use backend_lib::AppState;
use coderoom_common::{
    AiContext, ClientEvent, CurrentFile, ServerEvent, SuggestionStatus,
};
use uuid::Uuid;

use crate::test_utils::{assert_silent, connect, join, recv_event, send, setup_server, WsClient};

const FIX_REPLY: &str = "Here's the fix:\n```python\nprint(\"hi\")\nprint(\"bye\")\n```";

fn python_context() -> AiContext {
    AiContext {
        current_file: Some(CurrentFile {
            id: "f1".into(),
            name: "main.py".into(),
            content: "print(\"hi\")".into(),
            language: "python".into(),
        }),
        ..AiContext::default()
    }
}

fn ai_query(query: &str, message_id: &str) -> ClientEvent {
    ClientEvent::AiQuery {
        query: query.into(),
        context: python_context(),
        message_id: message_id.into(),
    }
}

/// Consume one composing cycle: `AI_TYPING(true)`, one event in the
/// middle, `AI_TYPING(false)`. Returns the middle event.
async fn expect_ai_cycle(client: &mut WsClient) -> ServerEvent {
    match recv_event(client).await {
        ServerEvent::AiTyping { is_typing: true } => {}
        other => panic!("expected AiTyping(true), got {other:?}"),
    }
    let middle = recv_event(client).await;
    match recv_event(client).await {
        ServerEvent::AiTyping { is_typing: false } => {}
        other => panic!("expected AiTyping(false), got {other:?}"),
    }
    middle
}

fn expect_response(event: ServerEvent) -> (String, String, Option<coderoom_common::CodeSuggestion>, Option<String>) {
    match event {
        ServerEvent::AiResponse {
            message_id,
            response,
            suggestion,
            error,
        } => (message_id, response, suggestion, error),
        other => panic!("expected AiResponse, got {other:?}"),
    }
}

/// A modification query produces a pending suggestion and the whole
/// room, requester included, sees the same composing cycle and answer.
#[tokio::test]
async fn modification_query_offers_suggestion_room_wide() {
    let mock = Arc::new(MockBackend::single(MockReply::text(FIX_REPLY)));
    let (addr, state) = setup_server(Some(mock.clone() as Arc<dyn CompletionBackend>)).await;

    let mut alice = connect(addr).await;
    let (alice_me, _) = join(&mut alice, "r1", "alice").await;
    let mut bob = connect(addr).await;
    join(&mut bob, "r1", "bob").await;
    let _ = recv_event(&mut alice).await; // bob's ParticipantJoined

    send(&mut alice, &ai_query("fix this so it also says bye", "m1")).await;

    for client in [&mut alice, &mut bob] {
        let (message_id, response, suggestion, error) =
            expect_response(expect_ai_cycle(client).await);
        assert_eq!(message_id, "m1");
        assert_eq!(response, FIX_REPLY);
        assert!(error.is_none());

        let suggestion = suggestion.expect("modification reply carries a suggestion");
        assert_eq!(suggestion.file_id, "f1");
        assert_eq!(suggestion.file_name, "main.py");
        assert_eq!(suggestion.original_code, "print(\"hi\")");
        assert_eq!(suggestion.suggested_code, "print(\"hi\")\nprint(\"bye\")");
        assert_eq!(suggestion.explanation, "Here's the fix:");
        assert_eq!(suggestion.status, SuggestionStatus::Pending);
    }

    assert_eq!(mock.call_count(), 1);
    let record = state
        .ai
        .message(alice_me.connection_id, "m1")
        .expect("query is recorded");
    assert!(record.answered);
    assert_eq!(record.response, FIX_REPLY);
    assert!(record.suggestion_id.is_some());
}

/// Accepting a pending suggestion publishes the authoritative file
/// mutation, then the acceptance notice, to everyone. A second
/// resolution attempt conflicts.
#[tokio::test]
async fn accepted_suggestion_applies_file_update_room_wide() {
    let mock = Arc::new(MockBackend::single(MockReply::text(FIX_REPLY)));
    let (addr, state) = setup_server(Some(mock as Arc<dyn CompletionBackend>)).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "r1", "alice").await;
    let mut bob = connect(addr).await;
    join(&mut bob, "r1", "bob").await;
    let _ = recv_event(&mut alice).await; // bob's ParticipantJoined

    send(&mut alice, &ai_query("fix this so it also says bye", "m1")).await;
    let (_, _, suggestion, _) = expect_response(expect_ai_cycle(&mut alice).await);
    let suggestion = suggestion.expect("pending suggestion");
    let _ = expect_ai_cycle(&mut bob).await;

    // The target file must be the actor's open file at accept time
    send(
        &mut alice,
        &ClientEvent::ActiveFileChanged {
            file_id: Some("f1".into()),
        },
    )
    .await;
    send(
        &mut alice,
        &ClientEvent::AiSuggestionAccepted {
            suggestion_id: suggestion.id,
            file_id: "f1".into(),
        },
    )
    .await;

    for client in [&mut alice, &mut bob] {
        match recv_event(client).await {
            ServerEvent::FileUpdated {
                file_id,
                new_content,
            } => {
                assert_eq!(file_id, "f1");
                assert_eq!(new_content, "print(\"hi\")\nprint(\"bye\")");
            }
            other => panic!("expected FileUpdated, got {other:?}"),
        }
        match recv_event(client).await {
            ServerEvent::AiSuggestionAccepted {
                suggestion_id,
                file_id,
            } => {
                assert_eq!(suggestion_id, suggestion.id);
                assert_eq!(file_id, "f1");
            }
            other => panic!("expected AiSuggestionAccepted, got {other:?}"),
        }
    }

    let stored = state.ai.suggestion(suggestion.id).expect("still retained");
    assert_eq!(stored.status, SuggestionStatus::Accepted);

    // Already resolved: the late reject conflicts, and only bob hears it
    send(
        &mut bob,
        &ClientEvent::AiSuggestionRejected {
            suggestion_id: suggestion.id,
        },
    )
    .await;
    match recv_event(&mut bob).await {
        ServerEvent::Error { code, message } => {
            assert_eq!(code, "STATE_CONFLICT");
            assert_eq!(message, "Suggestion is no longer pending");
        }
        other => panic!("expected Error, got {other:?}"),
    }
    assert_silent(&mut alice).await;
}

/// Accepting against a stale editor state conflicts and leaves the
/// suggestion pending; rejecting it afterwards still works.
#[tokio::test]
async fn accept_requires_matching_open_file() {
    let mock = Arc::new(MockBackend::single(MockReply::text(FIX_REPLY)));
    let (addr, state) = setup_server(Some(mock as Arc<dyn CompletionBackend>)).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "r1", "alice").await;
    let mut bob = connect(addr).await;
    join(&mut bob, "r1", "bob").await;
    let _ = recv_event(&mut alice).await; // bob's ParticipantJoined

    send(&mut alice, &ai_query("fix this so it also says bye", "m1")).await;
    let (_, _, suggestion, _) = expect_response(expect_ai_cycle(&mut alice).await);
    let suggestion = suggestion.expect("pending suggestion");
    let _ = expect_ai_cycle(&mut bob).await;

    // Alice moved on to another file since the suggestion was offered
    send(
        &mut alice,
        &ClientEvent::ActiveFileChanged {
            file_id: Some("f2".into()),
        },
    )
    .await;
    send(
        &mut alice,
        &ClientEvent::AiSuggestionAccepted {
            suggestion_id: suggestion.id,
            file_id: "f1".into(),
        },
    )
    .await;

    match recv_event(&mut alice).await {
        ServerEvent::Error { code, message } => {
            assert_eq!(code, "STATE_CONFLICT");
            assert_eq!(message, "Target file is no longer open");
        }
        other => panic!("expected Error, got {other:?}"),
    }
    assert_silent(&mut bob).await;
    assert_eq!(
        state.ai.suggestion(suggestion.id).map(|s| s.status),
        Some(SuggestionStatus::Pending),
        "failed accept leaves the suggestion pending"
    );

    // Rejection needs no open-file check
    send(
        &mut alice,
        &ClientEvent::AiSuggestionRejected {
            suggestion_id: suggestion.id,
        },
    )
    .await;
    for client in [&mut alice, &mut bob] {
        match recv_event(client).await {
            ServerEvent::AiSuggestionRejected { suggestion_id } => {
                assert_eq!(suggestion_id, suggestion.id);
            }
            other => panic!("expected AiSuggestionRejected, got {other:?}"),
        }
    }
    assert_eq!(
        state.ai.suggestion(suggestion.id).map(|s| s.status),
        Some(SuggestionStatus::Rejected)
    );
}

/// Backend failures reach the requester alone; the rest of the room
/// only ever sees the composing indicator flip.
#[tokio::test]
async fn backend_failure_is_unicast_to_requester() {
    let mock = Arc::new(MockBackend::single(MockReply::Error(AppError::Backend(
        "upstream 500".into(),
    ))));
    let (addr, state) = setup_server(Some(mock as Arc<dyn CompletionBackend>)).await;

    let mut alice = connect(addr).await;
    let (alice_me, _) = join(&mut alice, "r1", "alice").await;
    let mut bob = connect(addr).await;
    join(&mut bob, "r1", "bob").await;
    let _ = recv_event(&mut alice).await; // bob's ParticipantJoined

    send(&mut alice, &ai_query("fix the loop", "m1")).await;

    let (message_id, response, suggestion, error) =
        expect_response(expect_ai_cycle(&mut alice).await);
    assert_eq!(message_id, "m1");
    assert_eq!(response, "");
    assert!(suggestion.is_none());
    assert_eq!(error.as_deref(), Some("Failed to process AI query"));

    // Bob sees the indicator flip and nothing in between
    match recv_event(&mut bob).await {
        ServerEvent::AiTyping { is_typing: true } => {}
        other => panic!("expected AiTyping(true), got {other:?}"),
    }
    match recv_event(&mut bob).await {
        ServerEvent::AiTyping { is_typing: false } => {}
        other => panic!("expected AiTyping(false), got {other:?}"),
    }
    assert_silent(&mut bob).await;

    let record = state
        .ai
        .message(alice_me.connection_id, "m1")
        .expect("failed query is still recorded");
    assert!(record.answered);
    assert_eq!(record.response, "");
}

/// With no backend configured the rooms still work and the assistant
/// reports itself unavailable.
#[tokio::test]
async fn missing_backend_reports_unavailable() {
    let (addr, _state) = setup_server(None).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "r1", "alice").await;

    send(&mut alice, &ai_query("fix the loop", "m1")).await;

    let (_, _, _, error) = expect_response(expect_ai_cycle(&mut alice).await);
    assert_eq!(
        error.as_deref(),
        Some("AI assistant is not available. Please check server configuration.")
    );
}

/// A plain question never offers a suggestion, even when the reply
/// contains a code fence.
#[tokio::test]
async fn question_reply_with_fence_offers_no_suggestion() {
    let reply = "It prints hi.\n```python\nprint(\"hi\")\n```";
    let mock = Arc::new(MockBackend::single(MockReply::text(reply)));
    let (addr, state) = setup_server(Some(mock as Arc<dyn CompletionBackend>)).await;

    let mut alice = connect(addr).await;
    let (alice_me, _) = join(&mut alice, "r1", "alice").await;

    send(&mut alice, &ai_query("What does this function do?", "m1")).await;

    let (_, response, suggestion, error) = expect_response(expect_ai_cycle(&mut alice).await);
    assert_eq!(response, reply);
    assert!(suggestion.is_none());
    assert!(error.is_none());
    assert!(state
        .ai
        .message(alice_me.connection_id, "m1")
        .expect("recorded")
        .suggestion_id
        .is_none());
}

/// A reply whose code still contains placeholders is answered but not
/// offered as a suggestion.
#[tokio::test]
async fn placeholder_reply_offers_no_suggestion() {
    let reply = "Try this:\n```python\nprint(\"hi\")\n# ... rest of code\n```";
    let mock = Arc::new(MockBackend::single(MockReply::text(reply)));
    let (addr, _state) = setup_server(Some(mock as Arc<dyn CompletionBackend>)).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "r1", "alice").await;

    send(&mut alice, &ai_query("fix this so it also says bye", "m1")).await;

    let (_, response, suggestion, _) = expect_response(expect_ai_cycle(&mut alice).await);
    assert_eq!(response, reply);
    assert!(suggestion.is_none());
}

/// Message ids are never reused for the lifetime of the process; a
/// duplicate is refused before the backend is consulted.
#[tokio::test]
async fn duplicate_message_id_is_rejected_without_backend_call() {
    let mock = Arc::new(MockBackend::new(vec![
        MockReply::text(FIX_REPLY),
        MockReply::text("should never be consumed"),
    ]));
    let (addr, state) = setup_server(Some(mock.clone() as Arc<dyn CompletionBackend>)).await;

    let mut alice = connect(addr).await;
    let (alice_me, _) = join(&mut alice, "r1", "alice").await;

    send(&mut alice, &ai_query("fix this so it also says bye", "m1")).await;
    let _ = expect_ai_cycle(&mut alice).await;

    send(&mut alice, &ai_query("fix it differently", "m1")).await;
    match recv_event(&mut alice).await {
        ServerEvent::Error { code, message } => {
            assert_eq!(code, "STATE_CONFLICT");
            assert_eq!(message, "Message ID 'm1' is already in use");
        }
        other => panic!("expected Error, got {other:?}"),
    }

    assert_eq!(mock.call_count(), 1);
    let record = state
        .ai
        .message(alice_me.connection_id, "m1")
        .expect("first record survives");
    assert_eq!(record.response, FIX_REPLY);
    assert_eq!(record.query, "fix this so it also says bye");
}

/// A backend slower than the configured ceiling times out and the
/// requester learns it. Driven through the orchestrator directly so
/// the clock can be virtual.
#[tokio::test(start_paused = true)]
async fn slow_backend_times_out() {
    use tokio::sync::mpsc;

    fn next_frame(rx: &mut mpsc::Receiver<String>) -> ServerEvent {
        let frame = rx.try_recv().expect("expected a queued frame");
        serde_json::from_str(&frame).expect("frame parses as ServerEvent")
    }

    let mut settings = Settings::default();
    settings.ai.request_timeout_secs = 1;
    let mock = Arc::new(MockBackend::single(MockReply::delayed(
        Duration::from_secs(5),
        MockReply::text("too late"),
    )));
    let state = AppState::new(settings, Some(mock as Arc<dyn CompletionBackend>));

    let alice = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<String>(8);
    state.lifecycle.join("r1", "alice", alice, tx).unwrap();
    let _ = next_frame(&mut rx); // own JoinAccepted

    state
        .ai
        .handle_query(alice, "explain".into(), AiContext::default(), "m1".into())
        .await;

    assert_eq!(
        next_frame(&mut rx),
        ServerEvent::AiTyping { is_typing: true }
    );
    match next_frame(&mut rx) {
        ServerEvent::AiResponse {
            message_id, error, ..
        } => {
            assert_eq!(message_id, "m1");
            assert_eq!(error.as_deref(), Some("AI request timed out"));
        }
        other => panic!("expected AiResponse, got {other:?}"),
    }
    assert_eq!(
        next_frame(&mut rx),
        ServerEvent::AiTyping { is_typing: false }
    );

    let record = state.ai.message(alice, "m1").expect("recorded");
    assert!(record.answered);
}
