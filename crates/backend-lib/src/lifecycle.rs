// ============================
// crates/backend-lib/src/lifecycle.rs
// ============================
//! Connection admission and teardown.

use coderoom_common::{Participant, ServerEvent};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::metrics::{JOIN_ADMITTED, JOIN_REJECTED};
use crate::registry::{ConnectionTx, SessionRegistry};
use crate::router::RoomRouter;

/// Drives the per-connection state machine:
/// connected -> joined -> disconnecting -> gone.
pub struct LifecycleManager {
    registry: Arc<SessionRegistry>,
    router: Arc<RoomRouter>,
}

impl LifecycleManager {
    pub fn new(registry: Arc<SessionRegistry>, router: Arc<RoomRouter>) -> Self {
        Self { registry, router }
    }

    /// Admit a connection into a room.
    ///
    /// The rest of the room learns the one new member via
    /// `PARTICIPANT_JOINED`; the joiner alone receives `JOIN_ACCEPTED` with
    /// the full roster. On a name collision the connection receives
    /// `USERNAME_EXISTS`, stays unadmitted and may retry.
    pub fn join(
        &self,
        room_id: &str,
        username: &str,
        connection_id: Uuid,
        tx: ConnectionTx,
    ) -> Result<Participant, AppError> {
        match self
            .registry
            .admit(room_id, username, connection_id, tx.clone())
        {
            Ok((participant, members)) => {
                metrics::counter!(JOIN_ADMITTED).increment(1);
                info!(room = room_id, username, %connection_id, "participant joined");
                self.router.publish(
                    room_id,
                    &ServerEvent::ParticipantJoined {
                        participant: participant.clone(),
                    },
                    Some(connection_id),
                );
                RoomRouter::send(
                    &tx,
                    &ServerEvent::JoinAccepted {
                        participant: participant.clone(),
                        members,
                    },
                );
                Ok(participant)
            }
            Err(err @ AppError::UsernameTaken { .. }) => {
                metrics::counter!(JOIN_REJECTED).increment(1);
                info!(room = room_id, username, %connection_id, "join rejected, username taken");
                RoomRouter::send(&tx, &ServerEvent::UsernameExists);
                Err(err)
            }
            Err(err) => {
                warn!(room = room_id, username, %connection_id, error = %err, "join failed");
                RoomRouter::send(&tx, &err.to_event());
                Err(err)
            }
        }
    }

    /// Tear down a connection. Safe to call more than once: only the call
    /// that actually removes the record publishes `PARTICIPANT_LEFT`.
    pub fn disconnect(&self, connection_id: Uuid) -> Option<Participant> {
        let participant = self.registry.remove(connection_id)?;
        info!(
            room = %participant.room_id,
            username = %participant.username,
            %connection_id,
            remaining = self.registry.participant_count(),
            "participant left"
        );
        self.router.publish(
            &participant.room_id,
            &ServerEvent::ParticipantLeft {
                participant: participant.clone(),
            },
            None,
        );
        Some(participant)
    }
}
