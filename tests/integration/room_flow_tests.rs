// ============================
// tests/integration/room_flow_tests.rs
// ============================
//! Room lifecycle and broadcast flows over real WebSocket connections.

use coderoom_common::{ClientEvent, PresenceStatus, ServerEvent};
use serde_json::json;

use crate::test_utils::{assert_silent, connect, join, recv_event, send, setup_server};

/// The joiner alone receives the full roster; the room learns the one
/// new member.
#[tokio::test]
async fn join_delivers_roster_to_joiner_and_announce_to_room() {
    let (addr, _state) = setup_server(None).await;

    let mut alice = connect(addr).await;
    let (alice_me, roster) = join(&mut alice, "r1", "alice").await;
    assert_eq!(alice_me.username, "alice");
    assert_eq!(alice_me.status, PresenceStatus::Online);
    assert_eq!(roster.len(), 1);

    let mut bob = connect(addr).await;
    let (bob_me, roster) = join(&mut bob, "r1", "bob").await;
    let names: Vec<_> = roster.iter().map(|m| m.username.as_str()).collect();
    assert_eq!(names, ["alice", "bob"], "roster keeps join order");

    match recv_event(&mut alice).await {
        ServerEvent::ParticipantJoined { participant } => {
            assert_eq!(participant.connection_id, bob_me.connection_id);
            assert_eq!(participant.username, "bob");
        }
        other => panic!("expected ParticipantJoined, got {other:?}"),
    }
    // The announcement never echoes back to the joiner
    assert_silent(&mut bob).await;
}

/// A taken name rejects the join but keeps the connection usable: the
/// client may retry under another name, and the same name is free in a
/// different room.
#[tokio::test]
async fn username_collision_rejects_and_allows_retry() {
    let (addr, state) = setup_server(None).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "r1", "alice").await;

    let mut late = connect(addr).await;
    send(
        &mut late,
        &ClientEvent::JoinRequest {
            room_id: "r1".into(),
            username: "alice".into(),
        },
    )
    .await;
    assert_eq!(recv_event(&mut late).await, ServerEvent::UsernameExists);

    // Same connection, new name
    let (_, roster) = join(&mut late, "r1", "alice2").await;
    assert_eq!(roster.len(), 2);

    // Same name, different room
    let mut other_room = connect(addr).await;
    let (me, roster) = join(&mut other_room, "r2", "alice").await;
    assert_eq!(me.username, "alice");
    assert_eq!(roster.len(), 1);

    assert_eq!(state.registry.participant_count(), 3);
    assert_eq!(state.registry.room_count(), 2);
}

/// File edits relay to the rest of the room verbatim and never echo
/// back to the editor.
#[tokio::test]
async fn file_update_relays_to_room_without_echo() {
    let (addr, _state) = setup_server(None).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "r1", "alice").await;
    let mut bob = connect(addr).await;
    join(&mut bob, "r1", "bob").await;
    let _ = recv_event(&mut alice).await; // bob's ParticipantJoined

    send(
        &mut bob,
        &ClientEvent::FileUpdated {
            file_id: "f1".into(),
            new_content: "print(2)".into(),
        },
    )
    .await;

    match recv_event(&mut alice).await {
        ServerEvent::FileUpdated {
            file_id,
            new_content,
        } => {
            assert_eq!(file_id, "f1");
            assert_eq!(new_content, "print(2)");
        }
        other => panic!("expected FileUpdated, got {other:?}"),
    }
    assert_silent(&mut bob).await;
}

/// Traffic stays inside its room, and a hard-dropped connection is
/// announced to the members it leaves behind.
#[tokio::test]
async fn rooms_are_isolated_and_disconnects_are_announced() {
    let (addr, state) = setup_server(None).await;

    let mut alice = connect(addr).await;
    join(&mut alice, "r1", "alice").await;
    let mut bob = connect(addr).await;
    let (bob_me, _) = join(&mut bob, "r1", "bob").await;
    let _ = recv_event(&mut alice).await; // bob's ParticipantJoined
    let mut carol = connect(addr).await;
    join(&mut carol, "r2", "carol").await;

    send(
        &mut bob,
        &ClientEvent::ChatMessage {
            message: json!({"text": "hello r1"}),
        },
    )
    .await;

    match recv_event(&mut alice).await {
        ServerEvent::ChatMessage { message } => {
            assert_eq!(message, json!({"text": "hello r1"}));
        }
        other => panic!("expected ChatMessage, got {other:?}"),
    }
    assert_silent(&mut carol).await;

    // Drop the socket without a close handshake
    drop(bob);

    match recv_event(&mut alice).await {
        ServerEvent::ParticipantLeft { participant } => {
            assert_eq!(participant.connection_id, bob_me.connection_id);
        }
        other => panic!("expected ParticipantLeft, got {other:?}"),
    }
    assert_eq!(state.registry.participant_count(), 2);
    assert_silent(&mut carol).await;
}

/// Presence flips carry the subject's connection id to the rest of the
/// room.
#[tokio::test]
async fn presence_change_is_broadcast_with_connection_id() {
    let (addr, _state) = setup_server(None).await;

    let mut alice = connect(addr).await;
    let (alice_me, _) = join(&mut alice, "r1", "alice").await;
    let mut bob = connect(addr).await;
    join(&mut bob, "r1", "bob").await;
    let _ = recv_event(&mut alice).await; // bob's ParticipantJoined

    send(
        &mut alice,
        &ClientEvent::PresenceChanged {
            status: PresenceStatus::Offline,
        },
    )
    .await;

    match recv_event(&mut bob).await {
        ServerEvent::PresenceChanged {
            connection_id,
            status,
        } => {
            assert_eq!(connection_id, alice_me.connection_id);
            assert_eq!(status, PresenceStatus::Offline);
        }
        other => panic!("expected PresenceChanged, got {other:?}"),
    }
    assert_silent(&mut alice).await;
}

/// A frame that fails to parse draws an error report and leaves the
/// connection open for a valid join.
#[tokio::test]
async fn malformed_frame_reports_error_and_connection_survives() {
    use futures_util::SinkExt;
    use tokio_tungstenite::tungstenite::Message;

    let (addr, _state) = setup_server(None).await;
    let mut client = connect(addr).await;

    client
        .send(Message::Text("not json".into()))
        .await
        .expect("send raw frame");

    match recv_event(&mut client).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, "MALFORMED_EVENT"),
        other => panic!("expected Error, got {other:?}"),
    }

    let (me, _) = join(&mut client, "r1", "alice").await;
    assert_eq!(me.username, "alice");
}
