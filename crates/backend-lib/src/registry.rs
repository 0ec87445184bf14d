// ============================
// crates/backend-lib/src/registry.rs
// ============================
//! Authoritative participant state.
//!
//! One mutex guards the participant map and the room index together so
//! admission's check-then-insert is atomic across both.

use coderoom_common::{Participant, PresenceStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

/// Outbound handle for one connection; frames are serialized before queueing.
pub type ConnectionTx = mpsc::Sender<String>;

struct Entry {
    participant: Participant,
    tx: ConnectionTx,
}

#[derive(Default)]
struct RegistryInner {
    participants: HashMap<Uuid, Entry>,
    /// Room id -> member connection ids in join order.
    rooms: HashMap<String, Vec<Uuid>>,
}

/// Owns every `Participant` record and the derived room membership index.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a connection into a room under a display name.
    ///
    /// Rejects when an online member of the room already holds the name.
    /// Returns the new record plus the roster snapshot taken at admission
    /// time (join order, joiner last).
    pub fn admit(
        &self,
        room_id: &str,
        username: &str,
        connection_id: Uuid,
        tx: ConnectionTx,
    ) -> Result<(Participant, Vec<Participant>), AppError> {
        let mut inner = self.inner.lock();

        if inner.participants.contains_key(&connection_id) {
            return Err(AppError::StateConflict(
                "Connection already joined a room".to_string(),
            ));
        }

        let taken = inner
            .rooms
            .get(room_id)
            .map(|members| {
                members.iter().any(|id| {
                    inner.participants.get(id).is_some_and(|entry| {
                        entry.participant.status == PresenceStatus::Online
                            && entry.participant.username == username
                    })
                })
            })
            .unwrap_or(false);
        if taken {
            return Err(AppError::UsernameTaken {
                room_id: room_id.to_string(),
                username: username.to_string(),
            });
        }

        let participant = Participant {
            connection_id,
            room_id: room_id.to_string(),
            username: username.to_string(),
            status: PresenceStatus::Online,
            typing: false,
            cursor_offset: 0,
            active_file_id: None,
        };
        inner.participants.insert(
            connection_id,
            Entry {
                participant: participant.clone(),
                tx,
            },
        );
        inner
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .push(connection_id);

        let members = Self::members_locked(&inner, room_id);
        Ok((participant, members))
    }

    /// Remove a connection. Idempotent: a second call for the same id
    /// returns `None`.
    pub fn remove(&self, connection_id: Uuid) -> Option<Participant> {
        let mut inner = self.inner.lock();
        let entry = inner.participants.remove(&connection_id)?;
        let room_id = entry.participant.room_id.clone();
        if let Some(members) = inner.rooms.get_mut(&room_id) {
            members.retain(|id| *id != connection_id);
            if members.is_empty() {
                inner.rooms.remove(&room_id);
            }
        }
        Some(entry.participant)
    }

    /// Last-write-wins presence flip. Unknown connection is a logged no-op.
    pub fn set_presence(
        &self,
        connection_id: Uuid,
        status: PresenceStatus,
    ) -> Option<Participant> {
        self.update(connection_id, "presence", |participant| {
            participant.status = status;
        })
    }

    /// Last-write-wins typing flag plus cursor offset. A `None` offset keeps
    /// the previous one (pause events carry no cursor).
    pub fn set_typing(
        &self,
        connection_id: Uuid,
        typing: bool,
        cursor_offset: Option<u64>,
    ) -> Option<Participant> {
        self.update(connection_id, "typing", |participant| {
            participant.typing = typing;
            if let Some(offset) = cursor_offset {
                participant.cursor_offset = offset;
            }
        })
    }

    /// Last-write-wins open-file reference.
    pub fn set_active_file(
        &self,
        connection_id: Uuid,
        file_id: Option<String>,
    ) -> Option<Participant> {
        self.update(connection_id, "active file", |participant| {
            participant.active_file_id = file_id;
        })
    }

    /// Roster snapshot in join order. Empty for unknown rooms.
    pub fn members_of(&self, room_id: &str) -> Vec<Participant> {
        let inner = self.inner.lock();
        Self::members_locked(&inner, room_id)
    }

    /// Snapshot of a single record.
    pub fn participant(&self, connection_id: Uuid) -> Option<Participant> {
        let inner = self.inner.lock();
        inner
            .participants
            .get(&connection_id)
            .map(|entry| entry.participant.clone())
    }

    /// Sender handles for a room, minus the excluded connection. Snapshot
    /// taken under the lock; delivery happens after release.
    pub(crate) fn room_txs(&self, room_id: &str, exclude: Option<Uuid>) -> Vec<ConnectionTx> {
        let inner = self.inner.lock();
        inner
            .rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|id| Some(**id) != exclude)
                    .filter_map(|id| inner.participants.get(id).map(|entry| entry.tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sender handle for one connection.
    pub(crate) fn tx_of(&self, connection_id: Uuid) -> Option<ConnectionTx> {
        let inner = self.inner.lock();
        inner
            .participants
            .get(&connection_id)
            .map(|entry| entry.tx.clone())
    }

    pub fn participant_count(&self) -> usize {
        self.inner.lock().participants.len()
    }

    pub fn room_count(&self) -> usize {
        self.inner.lock().rooms.len()
    }

    fn members_locked(inner: &RegistryInner, room_id: &str) -> Vec<Participant> {
        inner
            .rooms
            .get(room_id)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| {
                        inner
                            .participants
                            .get(id)
                            .map(|entry| entry.participant.clone())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn update(
        &self,
        connection_id: Uuid,
        what: &str,
        apply: impl FnOnce(&mut Participant),
    ) -> Option<Participant> {
        let mut inner = self.inner.lock();
        match inner.participants.get_mut(&connection_id) {
            Some(entry) => {
                apply(&mut entry.participant);
                Some(entry.participant.clone())
            }
            None => {
                debug!(%connection_id, what, "update for unknown connection, ignoring");
                None
            }
        }
    }
}
