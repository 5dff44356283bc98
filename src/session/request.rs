//! Session request and provisioning body
//!
//! A `SessionRequest` is an immutable snapshot of everything needed to ask the
//! session host for a PTY. A credential retry builds a new request from the old
//! one instead of mutating it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

use crate::config::{ClientConfig, SessionProfile};

/// Terminal size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub cols: u16,
    pub rows: u16,
}

impl Default for Geometry {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl Geometry {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Kind of PTY the host should allocate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// A shell on the session host
    Local,
    /// An SSH session opened by the session host
    Remote,
}

/// Identifier the session host assigned to a provisioned PTY
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Intent to open one session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    /// What to connect to
    pub profile: SessionProfile,
    /// Initial terminal size
    pub geometry: Geometry,
    /// Terminal type string
    pub term: String,
    /// SSH ready timeout (ms) forwarded to the host
    pub ready_timeout: u64,
    /// SSH keepalive interval (ms) forwarded to the host
    pub keepalive_interval: u64,
    /// Password supplied at the credential prompt
    pub credential: Option<String>,
    /// Delay before the initial command is sent
    pub init_command_delay: Duration,
    /// Focus and fit the surface once streaming starts
    pub focus_on_ready: bool,
}

impl SessionRequest {
    /// Build a request from a profile and a configuration snapshot
    pub fn new(profile: SessionProfile, config: &ClientConfig) -> Self {
        Self {
            profile,
            geometry: Geometry::default(),
            term: config.term.clone(),
            ready_timeout: config.ssh_ready_timeout,
            keepalive_interval: config.keepalive_interval,
            credential: None,
            init_command_delay: config.init_command_delay(),
            focus_on_ready: true,
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_focus_on_ready(mut self, focus: bool) -> Self {
        self.focus_on_ready = focus;
        self
    }

    /// Session identifier used with the metadata collaborator
    pub fn session_id(&self) -> &str {
        &self.profile.id
    }

    /// A host without an ssh-config origin is remote, everything else runs locally
    pub fn target_type(&self) -> TargetType {
        if self.profile.host.is_some() && !self.profile.is_config_sourced() {
            TargetType::Remote
        } else {
            TargetType::Local
        }
    }

    /// Copy of this request carrying a credential from the prompt
    pub fn with_credential(&self, password: impl Into<String>) -> Self {
        Self {
            credential: Some(password.into()),
            ..self.clone()
        }
    }

    /// JSON body for `POST /terminals`
    ///
    /// Later keys override earlier ones: profile fields over the geometry, the
    /// prompted password over the profile password, and the computed `type`
    /// over anything the profile carried.
    pub fn provision_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("cols".into(), self.geometry.cols.into());
        body.insert("rows".into(), self.geometry.rows.into());
        body.insert("term".into(), self.term.clone().into());

        if let Ok(Value::Object(fields)) = serde_json::to_value(&self.profile) {
            body.extend(fields);
        }
        if let Some(password) = &self.credential {
            body.insert("password".into(), password.clone().into());
        }

        body.insert("readyTimeout".into(), self.ready_timeout.into());
        body.insert("keepaliveInterval".into(), self.keepalive_interval.into());
        let target = serde_json::to_value(self.target_type()).unwrap_or(Value::Null);
        body.insert("type".into(), target);
        Value::Object(body)
    }
}
