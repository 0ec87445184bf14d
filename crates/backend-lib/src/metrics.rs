// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const WS_ACTIVE: &str = "ws.active";
pub const JOIN_ADMITTED: &str = "room.join.admitted";
pub const JOIN_REJECTED: &str = "room.join.rejected";
pub const EVENT_PUBLISHED: &str = "room.event.published";
pub const EVENT_DROPPED: &str = "room.event.dropped";
pub const AI_QUERY: &str = "ai.query";
pub const AI_QUERY_FAILED: &str = "ai.query.failed";
pub const SUGGESTION_OFFERED: &str = "ai.suggestion.offered";
pub const SUGGESTION_ACCEPTED: &str = "ai.suggestion.accepted";
pub const SUGGESTION_REJECTED: &str = "ai.suggestion.rejected";
