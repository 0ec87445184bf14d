// ============================
// backend-lib/src/ai/mod.rs
// ============================
//! AI query orchestration.
//!
//! Correlates each room query with exactly one response, drives the
//! room-wide composing indicator, and runs the suggestion accept/reject
//! state machine. Backend calls happen with no registry lock held:
//! context is captured first, state is written back after the call
//! returns.
pub mod backend;
pub mod mock;
pub mod prompt;
pub mod suggestion;

use chrono::{DateTime, Utc};
use coderoom_common::{AiContext, ServerEvent, SuggestionStatus};
use dashmap::DashMap;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AiSettings;
use crate::error::AppError;
use crate::metrics::{
    AI_QUERY, AI_QUERY_FAILED, SUGGESTION_ACCEPTED, SUGGESTION_OFFERED, SUGGESTION_REJECTED,
};
use crate::registry::SessionRegistry;
use crate::router::RoomRouter;
use backend::CompletionBackend;
use suggestion::SuggestionStore;

/// Record of one query issued by a participant. Created on submission,
/// mutated exactly once when the correlated response arrives, never
/// deleted.
#[derive(Debug, Clone)]
pub struct AiMessage {
    pub query: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub answered: bool,
    pub suggestion_id: Option<Uuid>,
}

/// Correlation layer between room participants and the completion
/// backend.
pub struct AiOrchestrator {
    backend: Option<Arc<dyn CompletionBackend>>,
    registry: Arc<SessionRegistry>,
    router: Arc<RoomRouter>,
    store: SuggestionStore,
    messages: DashMap<(Uuid, String), AiMessage>,
    request_timeout: Duration,
}

impl AiOrchestrator {
    pub fn new(
        backend: Option<Arc<dyn CompletionBackend>>,
        registry: Arc<SessionRegistry>,
        router: Arc<RoomRouter>,
        settings: &AiSettings,
    ) -> Self {
        Self {
            backend,
            registry,
            router,
            store: SuggestionStore::new(Duration::from_secs(settings.suggestion_retention_secs)),
            messages: DashMap::new(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }

    /// Whether a completion backend is configured at all.
    pub fn available(&self) -> bool {
        self.backend.is_some()
    }

    /// Recorded query log lookup, keyed by caller and message id.
    pub fn message(&self, connection_id: Uuid, message_id: &str) -> Option<AiMessage> {
        self.messages
            .get(&(connection_id, message_id.to_string()))
            .map(|record| record.value().clone())
    }

    /// Runs one query end to end: record it, raise the composing
    /// indicator for the whole room, call the backend, then publish the
    /// correlated response (or unicast the failure to the requester) and
    /// clear the indicator.
    pub async fn handle_query(
        &self,
        connection_id: Uuid,
        query: String,
        context: AiContext,
        message_id: String,
    ) {
        let Some(requester) = self.registry.participant(connection_id) else {
            debug!(connection = %connection_id, "query from unknown connection, dropping");
            return;
        };
        let room_id = requester.room_id.clone();

        // message ids are never reused for the lifetime of the process;
        // or_insert_with is atomic under the shard lock, so concurrent
        // duplicates cannot both register
        let mut fresh = false;
        self.messages
            .entry((connection_id, message_id.clone()))
            .or_insert_with(|| {
                fresh = true;
                AiMessage {
                    query: query.clone(),
                    response: String::new(),
                    created_at: Utc::now(),
                    answered: false,
                    suggestion_id: None,
                }
            });
        if !fresh {
            debug!(connection = %connection_id, message = %message_id, "duplicate message id");
            let err =
                AppError::StateConflict(format!("Message ID '{message_id}' is already in use"));
            self.router.unicast(connection_id, &err.to_event());
            return;
        }

        counter!(AI_QUERY).increment(1);
        debug!(room = %room_id, connection = %connection_id, message = %message_id, "query received");

        self.router
            .publish(&room_id, &ServerEvent::AiTyping { is_typing: true }, None);

        let wants_modification = prompt::requires_code_modification(&query);
        let rendered = prompt::build_query_prompt(&query, &context, wants_modification);

        match self.complete(&rendered).await {
            Ok(response) => {
                let suggestion = if wants_modification {
                    context
                        .current_file
                        .as_ref()
                        .and_then(|file| suggestion::extract_suggestion(&response, file))
                } else {
                    None
                };

                if let Some(offered) = &suggestion {
                    self.store.insert(offered.clone());
                    counter!(SUGGESTION_OFFERED).increment(1);
                    info!(
                        room = %room_id,
                        suggestion = %offered.id,
                        file = %offered.file_name,
                        "suggestion offered"
                    );
                }

                if let Some(mut record) = self.messages.get_mut(&(connection_id, message_id.clone())) {
                    record.response = response.clone();
                    record.answered = true;
                    record.suggestion_id = suggestion.as_ref().map(|s| s.id);
                }

                self.router.publish(
                    &room_id,
                    &ServerEvent::AiResponse {
                        message_id,
                        response,
                        suggestion,
                        error: None,
                    },
                    None,
                );
            }
            Err(err) => {
                counter!(AI_QUERY_FAILED).increment(1);
                warn!(room = %room_id, connection = %connection_id, error = %err, "query failed");

                if let Some(mut record) = self.messages.get_mut(&(connection_id, message_id.clone())) {
                    record.answered = true;
                }

                // failures are personal, the rest of the room never sees them
                self.router.unicast(
                    connection_id,
                    &ServerEvent::AiResponse {
                        message_id,
                        response: String::new(),
                        suggestion: None,
                        error: Some(err.client_message()),
                    },
                );
            }
        }

        self.router
            .publish(&room_id, &ServerEvent::AiTyping { is_typing: false }, None);
    }

    /// One backend call under the configured upper-bound timeout.
    pub async fn complete(&self, rendered_prompt: &str) -> Result<String, AppError> {
        let Some(backend) = &self.backend else {
            return Err(AppError::BackendUnavailable);
        };

        match tokio::time::timeout(self.request_timeout, backend.complete(rendered_prompt)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::BackendTimeout(self.request_timeout.as_secs())),
        }
    }

    /// Applies a pending suggestion: re-validates that the target file is
    /// still the actor's open file, flips the status, then publishes the
    /// authoritative file mutation and the acceptance notice to the whole
    /// room. Errors leave the suggestion untouched and surface to the
    /// actor only.
    pub fn accept_suggestion(
        &self,
        connection_id: Uuid,
        suggestion_id: Uuid,
        file_id: &str,
    ) -> Result<(), AppError> {
        let actor = self
            .registry
            .participant(connection_id)
            .ok_or(AppError::UnknownConnection(connection_id))?;

        let pending = self
            .store
            .get(suggestion_id)
            .ok_or_else(|| AppError::StateConflict("Suggestion is no longer pending".to_string()))?;

        if pending.status != SuggestionStatus::Pending {
            return Err(AppError::StateConflict(
                "Suggestion is no longer pending".to_string(),
            ));
        }
        if pending.file_id != file_id {
            return Err(AppError::StateConflict(
                "Suggestion does not target that file".to_string(),
            ));
        }
        if actor.active_file_id.as_deref() != Some(pending.file_id.as_str()) {
            return Err(AppError::StateConflict(
                "Target file is no longer open".to_string(),
            ));
        }

        let accepted = self.store.resolve(suggestion_id, SuggestionStatus::Accepted)?;
        counter!(SUGGESTION_ACCEPTED).increment(1);
        info!(
            room = %actor.room_id,
            suggestion = %suggestion_id,
            file = %accepted.file_name,
            "suggestion accepted"
        );

        self.router.publish(
            &actor.room_id,
            &ServerEvent::FileUpdated {
                file_id: accepted.file_id.clone(),
                new_content: accepted.suggested_code.clone(),
            },
            None,
        );
        self.router.publish(
            &actor.room_id,
            &ServerEvent::AiSuggestionAccepted {
                suggestion_id,
                file_id: accepted.file_id,
            },
            None,
        );
        Ok(())
    }

    /// Declines a pending suggestion and tells the room. No file
    /// mutation.
    pub fn reject_suggestion(&self, connection_id: Uuid, suggestion_id: Uuid) -> Result<(), AppError> {
        let actor = self
            .registry
            .participant(connection_id)
            .ok_or(AppError::UnknownConnection(connection_id))?;

        let rejected = self.store.resolve(suggestion_id, SuggestionStatus::Rejected)?;
        counter!(SUGGESTION_REJECTED).increment(1);
        info!(
            room = %actor.room_id,
            suggestion = %suggestion_id,
            file = %rejected.file_name,
            "suggestion rejected"
        );

        self.router.publish(
            &actor.room_id,
            &ServerEvent::AiSuggestionRejected { suggestion_id },
            None,
        );
        Ok(())
    }

    /// Suggestion lookup, mainly for the accept/reject flows and tests.
    pub fn suggestion(&self, suggestion_id: Uuid) -> Option<coderoom_common::CodeSuggestion> {
        self.store.get(suggestion_id)
    }
}
