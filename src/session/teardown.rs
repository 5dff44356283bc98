//! Teardown coordinator
//!
//! Releases whatever a session holds exactly once, no matter how many of
//! local close, remote close, transport error and unmount race for it.

use tracing::{debug, info};

use super::machine::Phase;
use crate::surface::LocalSurface;

/// Single-shot guard for releasing a session
#[derive(Debug, Default)]
pub struct Teardown {
    started: bool,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the teardown. Only the first call returns `true`.
    pub fn begin(&mut self) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        true
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

/// Release the resources held by `previous` and dispose the surface
pub(crate) fn release(session_id: &str, previous: Phase, surface: &mut dyn LocalSurface) {
    match previous {
        Phase::Provisioning { .. } => {
            debug!("Session {}: dropped in-flight provisioning", session_id);
        }
        Phase::Authenticating { .. } => {
            debug!("Session {}: abandoned credential prompt", session_id);
        }
        Phase::Streaming(adapter) => {
            let handle = adapter.handle().clone();
            if adapter.shutdown() {
                info!("Session {}: closed channel {}", session_id, handle);
            }
        }
        Phase::Idle { .. } | Phase::Closed | Phase::Errored(_) => {}
    }
    surface.dispose();
}
