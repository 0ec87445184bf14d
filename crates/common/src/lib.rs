// ================
// common/src/lib.rs
// ================
//! Shared wire types for the coderoom channel.
//! This module defines the WebSocket protocol events exchanged between a
//! collaboration client and the coordinator, plus the records they carry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Presence of a participant within its room.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// One connected identity within a room.
///
/// Created on successful join admission, removed on disconnect. Username
/// uniqueness holds among online participants of the same room.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Connection identity assigned by the server at socket accept time.
    pub connection_id: Uuid,
    /// Room this participant joined.
    pub room_id: String,
    /// Display name, unique among online members of the room.
    pub username: String,
    pub status: PresenceStatus,
    pub typing: bool,
    /// Last cursor offset reported by a typing event.
    pub cursor_offset: u64,
    /// File currently open in the participant's editor, if any.
    pub active_file_id: Option<String>,
}

/// Context bundle a client attaches to an AI query.
///
/// Everything is optional; the coordinator forwards what it gets and only
/// inspects `current_file` (suggestion extraction targets it).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_file: Option<CurrentFile>,
    /// Serialized file tree, opaque to the coordinator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_structure: Option<serde_json::Value>,
    /// Free-form summary of recent whiteboard activity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_context: Option<String>,
    /// Most recent chat lines, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Vec<ChatLine>>,
}

/// Snapshot of the file open in the requester's editor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentFile {
    pub id: String,
    pub name: String,
    pub content: String,
    /// Language tag as the editor reports it, e.g. "python".
    pub language: String,
}

/// One line of room chat, as included in AI context.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub username: String,
    pub message: String,
}

/// Lifecycle of a proposed file-content replacement.
///
/// Transitions are one-way and single-fire: `pending -> accepted` or
/// `pending -> rejected`, never both.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A proposed file-content replacement awaiting accept/reject.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeSuggestion {
    pub id: Uuid,
    /// File the replacement targets; re-validated at accept time.
    pub file_id: String,
    pub file_name: String,
    /// Content of the target file when the suggestion was produced.
    pub original_code: String,
    /// Proposed replacement content.
    pub suggested_code: String,
    /// Text preceding the first code fence in the response.
    pub explanation: String,
    pub status: SuggestionStatus,
}

/// Events sent from client to server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Ask to join a room under a display name. The only event accepted
    /// before admission.
    JoinRequest { room_id: String, username: String },
    /// Participant's own presence flip (tab hidden/visible).
    PresenceChanged { status: PresenceStatus },
    TypingStart { cursor_offset: u64 },
    TypingPause,
    /// Keeps the registry's open-file reference current; not broadcast.
    ActiveFileChanged { file_id: Option<String> },
    FileCreated {
        parent_dir_id: String,
        new_file: serde_json::Value,
    },
    FileUpdated { file_id: String, new_content: String },
    FileRenamed { file_id: String, new_name: String },
    FileDeleted { file_id: String },
    DirectoryCreated {
        parent_dir_id: String,
        new_directory: serde_json::Value,
    },
    DirectoryUpdated {
        dir_id: String,
        children: serde_json::Value,
    },
    DirectoryRenamed { dir_id: String, new_name: String },
    DirectoryDeleted { dir_id: String },
    /// Opaque chat payload, relayed verbatim to the rest of the room.
    ChatMessage { message: serde_json::Value },
    /// Existing member ships its tree to one newly joined connection.
    SyncFileStructure {
        file_structure: serde_json::Value,
        open_files: serde_json::Value,
        active_file: serde_json::Value,
        target_id: Uuid,
    },
    /// Ask the rest of the room for the current whiteboard state.
    RequestDrawing,
    SyncDrawing {
        drawing_data: serde_json::Value,
        target_id: Uuid,
    },
    DrawingUpdate { snapshot: serde_json::Value },
    /// Natural-language assistant query. `message_id` is caller-generated
    /// and must be unique among the caller's outstanding queries.
    AiQuery {
        query: String,
        context: AiContext,
        message_id: String,
    },
    /// Apply a pending suggestion. `file_id` is the file the actor believes
    /// is targeted; the server re-validates before applying.
    AiSuggestionAccepted { suggestion_id: Uuid, file_id: String },
    AiSuggestionRejected { suggestion_id: Uuid },
}

/// Events sent from server to client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Sent to the joiner alone: its own record plus the full roster in
    /// join order (joiner last).
    JoinAccepted {
        participant: Participant,
        members: Vec<Participant>,
    },
    /// Join rejection; the connection stays open and may retry.
    UsernameExists,
    /// Sent to the rest of the room when someone is admitted.
    ParticipantJoined { participant: Participant },
    ParticipantLeft { participant: Participant },
    PresenceChanged {
        connection_id: Uuid,
        status: PresenceStatus,
    },
    TypingStart { participant: Participant },
    TypingPause { participant: Participant },
    FileCreated {
        parent_dir_id: String,
        new_file: serde_json::Value,
    },
    FileUpdated { file_id: String, new_content: String },
    FileRenamed { file_id: String, new_name: String },
    FileDeleted { file_id: String },
    DirectoryCreated {
        parent_dir_id: String,
        new_directory: serde_json::Value,
    },
    DirectoryUpdated {
        dir_id: String,
        children: serde_json::Value,
    },
    DirectoryRenamed { dir_id: String, new_name: String },
    DirectoryDeleted { dir_id: String },
    ChatMessage { message: serde_json::Value },
    SyncFileStructure {
        file_structure: serde_json::Value,
        open_files: serde_json::Value,
        active_file: serde_json::Value,
    },
    /// Relayed to the rest of the room with the requester's id so one
    /// member can answer with `SYNC_DRAWING`.
    RequestDrawing { connection_id: Uuid },
    SyncDrawing { drawing_data: serde_json::Value },
    DrawingUpdate { snapshot: serde_json::Value },
    /// Room-wide composing indicator; never excludes anyone.
    AiTyping { is_typing: bool },
    /// Correlated answer to an `AI_QUERY`. Room-wide on success, unicast to
    /// the requester on backend failure.
    AiResponse {
        message_id: String,
        response: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggestion: Option<CodeSuggestion>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    AiSuggestionAccepted { suggestion_id: Uuid, file_id: String },
    AiSuggestionRejected { suggestion_id: Uuid },
    /// Per-connection failure report (state conflicts, malformed frames).
    Error { code: String, message: String },
}
