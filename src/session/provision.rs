//! Provisioning client
//!
//! Asks the session host for a PTY and classifies the answer. It never touches
//! session status; the state machine does that from the outcome.

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{SessionHandle, SessionRequest};
use crate::transport::{ProvisionReply, Transport};

/// Text the host returns when every SSH authentication method was rejected
pub const AUTH_FAILURE_MARKER: &str = "All configured authentication methods failed";

/// Result of one provisioning attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The host allocated a PTY
    Ready(SessionHandle),
    /// Authentication was rejected; retrying with a credential may work
    AuthFailure(String),
    /// Anything else; no retry
    Fatal(String),
}

/// Issues provisioning requests against one transport
#[derive(Clone)]
pub struct ProvisioningClient {
    transport: Arc<dyn Transport>,
}

impl ProvisioningClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Provision a PTY for `request`.
    ///
    /// The returned future owns everything it needs, so the caller can hold it
    /// in its state and cancel the attempt by dropping it.
    pub fn provision(&self, request: &SessionRequest) -> BoxFuture<'static, ProvisionOutcome> {
        let transport = Arc::clone(&self.transport);
        let body = request.provision_body();
        let session_id = request.session_id().to_string();

        Box::pin(async move {
            debug!("Provisioning session {}", session_id);
            match transport.provision(&body).await {
                Ok(reply) => classify(reply),
                Err(e) => {
                    warn!("Provisioning request for {} failed: {}", session_id, e);
                    ProvisionOutcome::Fatal(e.to_string())
                }
            }
        })
    }
}

/// Turn the host's raw reply into an outcome
pub fn classify(reply: ProvisionReply) -> ProvisionOutcome {
    match reply {
        ProvisionReply::Accepted(value) => match handle_from(&value) {
            Some(handle) => ProvisionOutcome::Ready(handle),
            None => ProvisionOutcome::Fatal(format!("Host returned no session id: {}", value)),
        },
        ProvisionReply::Rejected(body) => {
            let text = body.as_text();
            if text.contains(AUTH_FAILURE_MARKER) {
                ProvisionOutcome::AuthFailure(text)
            } else {
                ProvisionOutcome::Fatal(text)
            }
        }
    }
}

/// A truthy id: non-empty string or non-zero number
fn handle_from(value: &Value) -> Option<SessionHandle> {
    match value {
        Value::String(s) if !s.is_empty() => Some(SessionHandle::new(s.clone())),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(SessionHandle::new(n.to_string())),
        _ => None,
    }
}
