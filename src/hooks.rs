//! External collaborators of a session
//!
//! The session never owns persistence or UI. It reports through these traits:
//! credential persistence, session metadata (tab state) and the status view.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::session::{SessionStatus, StatusUpdate};

/// Errors reported by collaborators
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Failed to persist credential: {0}")]
    Persist(String),
}

/// Result type for collaborator calls
pub type HookResult<T> = Result<T, HookError>;

/// Credential fields saved back to a bookmark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub password: String,
}

/// Change to a session's remembered metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPatch {
    Status(SessionStatus),
    StartPath(String),
}

/// What the UI needs to ask for a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPrompt {
    /// Error text the host returned
    pub last_error: String,
    /// Whether offering "remember password" makes sense for this session
    pub can_remember: bool,
}

/// Persists credentials the user asked to remember
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn save(&self, src_id: &str, credential: &CredentialUpdate, origin: &str) -> HookResult<()>;
}

/// Stores per-session metadata such as status and last working directory
pub trait SessionMetadata: Send + Sync {
    fn update(&self, session_id: &str, patch: SessionPatch);
}

/// Status indicator, credential prompt and focus tracking
pub trait SessionUi: Send + Sync {
    fn status_changed(&self, session_id: &str, update: StatusUpdate);

    fn credential_required(&self, session_id: &str, prompt: &CredentialPrompt);

    /// The surface gained focus
    fn activated(&self, _session_id: &str) {}

    /// The surface selection changed
    fn selection_changed(&self, _session_id: &str) {}
}

/// The full set of collaborators handed to a session
#[derive(Clone)]
pub struct SessionHooks {
    pub credentials: Arc<dyn CredentialStore>,
    pub metadata: Arc<dyn SessionMetadata>,
    pub ui: Arc<dyn SessionUi>,
}

impl SessionHooks {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        metadata: Arc<dyn SessionMetadata>,
        ui: Arc<dyn SessionUi>,
    ) -> Self {
        Self {
            credentials,
            metadata,
            ui,
        }
    }
}

/// Collaborator that records everything in the log and persists nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHooks;

#[async_trait]
impl CredentialStore for LoggingHooks {
    async fn save(&self, src_id: &str, _credential: &CredentialUpdate, origin: &str) -> HookResult<()> {
        info!("Credential for {} ({}) not persisted: no store configured", src_id, origin);
        Ok(())
    }
}

impl SessionMetadata for LoggingHooks {
    fn update(&self, session_id: &str, patch: SessionPatch) {
        debug!("Session {} metadata: {:?}", session_id, patch);
    }
}

impl SessionUi for LoggingHooks {
    fn status_changed(&self, session_id: &str, update: StatusUpdate) {
        info!(
            "Session {} status {} (loading: {})",
            session_id, update.status, update.loading
        );
    }

    fn credential_required(&self, session_id: &str, prompt: &CredentialPrompt) {
        warn!("Session {} needs a credential: {}", session_id, prompt.last_error);
    }
}
