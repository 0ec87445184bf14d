// ============================
// crates/backend-lib/src/router.rs
// ============================
//! Room-scoped event fan-out.

use coderoom_common::ServerEvent;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::metrics::{EVENT_DROPPED, EVENT_PUBLISHED};
use crate::registry::{ConnectionTx, SessionRegistry};

/// Delivers typed events to room members over their connection channels.
///
/// Delivery is fire-and-forget: the event is serialized once, then queued on
/// each member's bounded channel. A full or closed channel drops that copy.
pub struct RoomRouter {
    registry: Arc<SessionRegistry>,
}

impl RoomRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver `event` to every current member of `room_id`, minus the
    /// excluded connection. A room with no members is a silent no-op.
    pub fn publish(&self, room_id: &str, event: &ServerEvent, exclude: Option<Uuid>) {
        let txs = self.registry.room_txs(room_id, exclude);
        if txs.is_empty() {
            return;
        }
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(room = room_id, error = %err, "failed to serialize event, dropping");
                return;
            }
        };
        metrics::counter!(EVENT_PUBLISHED).increment(1);
        for tx in txs {
            if let Err(err) = tx.try_send(frame.clone()) {
                metrics::counter!(EVENT_DROPPED).increment(1);
                debug!(room = room_id, error = %err, "skipping broadcast to slow client");
            }
        }
    }

    /// Deliver `event` to exactly one registered connection. An unknown
    /// target is a logged no-op.
    pub fn unicast(&self, connection_id: Uuid, event: &ServerEvent) {
        match self.registry.tx_of(connection_id) {
            Some(tx) => Self::send(&tx, event),
            None => debug!(%connection_id, "unicast to unknown connection, ignoring"),
        }
    }

    /// Deliver `event` on a raw connection channel, registered or not. Used
    /// for pre-admission replies (join rejections, malformed frames).
    pub fn send(tx: &ConnectionTx, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(frame) => {
                if let Err(err) = tx.try_send(frame) {
                    metrics::counter!(EVENT_DROPPED).increment(1);
                    debug!(error = %err, "failed to queue event (slow or disconnected)");
                }
            }
            Err(err) => warn!(error = %err, "failed to serialize event, dropping"),
        }
    }
}
