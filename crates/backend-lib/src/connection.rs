// ============================
// crates/backend-lib/src/connection.rs
// ============================
//! Per-connection inbound event dispatch.
//!
//! One handler per socket. Until a join succeeds only `JOIN_REQUEST` is
//! acted on; every other event is dropped with a log line. After
//! admission the handler relays room events (excluding the sender),
//! answers targeted syncs, and hands AI traffic to the orchestrator.
use coderoom_common::{ClientEvent, ServerEvent};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::registry::ConnectionTx;
use crate::router::RoomRouter;
use crate::validation;
use crate::AppState;

pub struct ConnectionHandler {
    state: Arc<AppState>,
    connection_id: Uuid,
    tx: ConnectionTx,
    room_id: Option<String>,
}

impl ConnectionHandler {
    pub fn new(state: Arc<AppState>, connection_id: Uuid, tx: ConnectionTx) -> Self {
        Self {
            state,
            connection_id,
            tx,
            room_id: None,
        }
    }

    /// Raw text frame entry point.
    pub fn handle_frame(&mut self, raw: &str) {
        match serde_json::from_str::<ClientEvent>(raw) {
            Ok(event) => self.handle_event(event),
            Err(err) => {
                debug!(connection = %self.connection_id, error = %err, "malformed frame");
                RoomRouter::send(
                    &self.tx,
                    &ServerEvent::Error {
                        code: "MALFORMED_EVENT".to_string(),
                        message: "Could not parse event".to_string(),
                    },
                );
            }
        }
    }

    pub fn handle_event(&mut self, event: ClientEvent) {
        if self.room_id.is_none() && !matches!(event, ClientEvent::JoinRequest { .. }) {
            debug!(connection = %self.connection_id, "event before admission, dropping");
            return;
        }

        match event {
            ClientEvent::JoinRequest { room_id, username } => {
                let room = match validation::validate_room_id(&room_id) {
                    Ok(room) => room.to_string(),
                    Err(err) => {
                        RoomRouter::send(&self.tx, &AppError::from(err).to_event());
                        return;
                    }
                };
                let name = match validation::validate_username(&username) {
                    Ok(name) => name.to_string(),
                    Err(err) => {
                        RoomRouter::send(&self.tx, &AppError::from(err).to_event());
                        return;
                    }
                };
                if self
                    .state
                    .lifecycle
                    .join(&room, &name, self.connection_id, self.tx.clone())
                    .is_ok()
                {
                    self.room_id = Some(room);
                }
            }

            ClientEvent::PresenceChanged { status } => {
                if let Some(participant) = self.state.registry.set_presence(self.connection_id, status)
                {
                    let event = ServerEvent::PresenceChanged {
                        connection_id: self.connection_id,
                        status: participant.status,
                    };
                    self.state
                        .router
                        .publish(&participant.room_id, &event, Some(self.connection_id));
                }
            }
            ClientEvent::TypingStart { cursor_offset } => {
                if let Some(participant) =
                    self.state
                        .registry
                        .set_typing(self.connection_id, true, Some(cursor_offset))
                {
                    let room = participant.room_id.clone();
                    self.state.router.publish(
                        &room,
                        &ServerEvent::TypingStart { participant },
                        Some(self.connection_id),
                    );
                }
            }
            ClientEvent::TypingPause => {
                if let Some(participant) =
                    self.state.registry.set_typing(self.connection_id, false, None)
                {
                    let room = participant.room_id.clone();
                    self.state.router.publish(
                        &room,
                        &ServerEvent::TypingPause { participant },
                        Some(self.connection_id),
                    );
                }
            }
            ClientEvent::ActiveFileChanged { file_id } => {
                self.state.registry.set_active_file(self.connection_id, file_id);
            }

            ClientEvent::FileCreated {
                parent_dir_id,
                new_file,
            } => self.relay(ServerEvent::FileCreated {
                parent_dir_id,
                new_file,
            }),
            ClientEvent::FileUpdated {
                file_id,
                new_content,
            } => self.relay(ServerEvent::FileUpdated {
                file_id,
                new_content,
            }),
            ClientEvent::FileRenamed { file_id, new_name } => {
                self.relay(ServerEvent::FileRenamed { file_id, new_name });
            }
            ClientEvent::FileDeleted { file_id } => {
                self.relay(ServerEvent::FileDeleted { file_id });
            }
            ClientEvent::DirectoryCreated {
                parent_dir_id,
                new_directory,
            } => self.relay(ServerEvent::DirectoryCreated {
                parent_dir_id,
                new_directory,
            }),
            ClientEvent::DirectoryUpdated { dir_id, children } => {
                self.relay(ServerEvent::DirectoryUpdated { dir_id, children });
            }
            ClientEvent::DirectoryRenamed { dir_id, new_name } => {
                self.relay(ServerEvent::DirectoryRenamed { dir_id, new_name });
            }
            ClientEvent::DirectoryDeleted { dir_id } => {
                self.relay(ServerEvent::DirectoryDeleted { dir_id });
            }
            ClientEvent::ChatMessage { message } => {
                self.relay(ServerEvent::ChatMessage { message });
            }

            ClientEvent::SyncFileStructure {
                file_structure,
                open_files,
                active_file,
                target_id,
            } => self.unicast_same_room(
                target_id,
                ServerEvent::SyncFileStructure {
                    file_structure,
                    open_files,
                    active_file,
                },
            ),
            ClientEvent::RequestDrawing => {
                self.relay(ServerEvent::RequestDrawing {
                    connection_id: self.connection_id,
                });
            }
            ClientEvent::SyncDrawing {
                drawing_data,
                target_id,
            } => self.unicast_same_room(target_id, ServerEvent::SyncDrawing { drawing_data }),
            ClientEvent::DrawingUpdate { snapshot } => {
                self.relay(ServerEvent::DrawingUpdate { snapshot });
            }

            ClientEvent::AiQuery {
                query,
                context,
                message_id,
            } => {
                if let Err(err) = validation::validate_query(&query) {
                    RoomRouter::send(&self.tx, &AppError::from(err).to_event());
                    return;
                }
                if let Err(err) = validation::validate_message_id(&message_id) {
                    RoomRouter::send(&self.tx, &AppError::from(err).to_event());
                    return;
                }
                let orchestrator = Arc::clone(&self.state.ai);
                let connection_id = self.connection_id;
                tokio::spawn(async move {
                    orchestrator
                        .handle_query(connection_id, query, context, message_id)
                        .await;
                });
            }
            ClientEvent::AiSuggestionAccepted {
                suggestion_id,
                file_id,
            } => {
                if let Err(err) =
                    self.state
                        .ai
                        .accept_suggestion(self.connection_id, suggestion_id, &file_id)
                {
                    RoomRouter::send(&self.tx, &err.to_event());
                }
            }
            ClientEvent::AiSuggestionRejected { suggestion_id } => {
                if let Err(err) = self.state.ai.reject_suggestion(self.connection_id, suggestion_id)
                {
                    RoomRouter::send(&self.tx, &err.to_event());
                }
            }
        }
    }

    /// Runs the disconnect flow once the socket is gone.
    pub fn finish(&self) {
        self.state.lifecycle.disconnect(self.connection_id);
    }

    /// Room broadcast that never echoes back to the sender.
    fn relay(&self, event: ServerEvent) {
        if let Some(room_id) = &self.room_id {
            self.state
                .router
                .publish(room_id, &event, Some(self.connection_id));
        }
    }

    /// Targeted delivery, valid only within the sender's room.
    fn unicast_same_room(&self, target_id: Uuid, event: ServerEvent) {
        let Some(room_id) = &self.room_id else { return };
        match self.state.registry.participant(target_id) {
            Some(target) if &target.room_id == room_id => {
                self.state.router.unicast(target_id, &event);
            }
            _ => {
                debug!(
                    connection = %self.connection_id,
                    target = %target_id,
                    "sync target not in room, dropping"
                );
            }
        }
    }
}
