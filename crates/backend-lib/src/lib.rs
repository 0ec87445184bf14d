// ============================
// backend-lib/src/lib.rs
// ============================
//! Core backend-lib functionality for the CodeRoom collaboration server.
pub mod ai;
pub mod config;
pub mod connection;
pub mod error;
pub mod http_api;
pub mod lifecycle;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod validation;
pub mod ws_router;

use std::sync::Arc;

use crate::ai::backend::CompletionBackend;
use crate::ai::AiOrchestrator;
use crate::config::Settings;
use crate::lifecycle::LifecycleManager;
use crate::registry::SessionRegistry;
use crate::router::RoomRouter;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Participant records and room membership
    pub registry: Arc<SessionRegistry>,
    /// Room-scoped fan-out
    pub router: Arc<RoomRouter>,
    /// Join and disconnect flows
    pub lifecycle: Arc<LifecycleManager>,
    /// Query correlation and the suggestion state machine
    pub ai: Arc<AiOrchestrator>,
    /// Settings manager
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create a new application state. `backend` is `None` when no API
    /// key is configured; the rooms still work, the assistant surface
    /// reports unavailable.
    pub fn new(settings: Settings, backend: Option<Arc<dyn CompletionBackend>>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let router = Arc::new(RoomRouter::new(Arc::clone(&registry)));
        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::clone(&registry),
            Arc::clone(&router),
        ));
        let ai = Arc::new(AiOrchestrator::new(
            backend,
            Arc::clone(&registry),
            Arc::clone(&router),
            &settings.ai,
        ));

        Self {
            registry,
            router,
            lifecycle,
            ai,
            settings: Arc::new(settings),
        }
    }
}
