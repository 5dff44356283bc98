//! Session status as seen by collaborators

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status exposed to the tab list and other views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Provisioning in progress
    Pending,
    /// Waiting for the user to supply a credential
    Authenticating,
    /// Streaming
    Success,
    /// Failed; only a new session recovers
    Error,
}

impl SessionStatus {
    fn rank(self) -> u8 {
        match self {
            SessionStatus::Pending | SessionStatus::Authenticating => 0,
            SessionStatus::Success => 1,
            SessionStatus::Error => 2,
        }
    }

    /// Whether moving from `self` to `next` goes forward
    pub fn can_advance_to(self, next: SessionStatus) -> bool {
        next.rank() >= self.rank()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Authenticating => "authenticating",
            SessionStatus::Success => "success",
            SessionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Status plus the loading indicator, as pushed to the UI collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: SessionStatus,
    pub loading: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_moves_forward() {
        assert!(SessionStatus::Pending.can_advance_to(SessionStatus::Success));
        assert!(SessionStatus::Pending.can_advance_to(SessionStatus::Error));
        assert!(SessionStatus::Success.can_advance_to(SessionStatus::Error));
        assert!(!SessionStatus::Error.can_advance_to(SessionStatus::Success));
        assert!(!SessionStatus::Success.can_advance_to(SessionStatus::Pending));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&SessionStatus::Success).unwrap();
        assert_eq!(json, "\"success\"");
        assert_eq!(SessionStatus::Error.to_string(), "error");
    }
}
