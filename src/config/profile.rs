//! Connection profiles
//!
//! A profile describes what to open: a local shell, an ad hoc remote host, a
//! bookmarked host, or an entry from the user's ssh config.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Origin recorded for bookmarks when none is given
pub const DEFAULT_ORIGIN: &str = "bookmarks";

/// Where a session definition came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileSource {
    /// Parameters typed in by hand
    #[default]
    Adhoc,
    /// A saved bookmark
    Bookmark,
    /// A host entry from the ssh config file
    SshConfig,
}

/// Parameters of one session, as stored in the config file and sent to the
/// session host when provisioning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionProfile {
    /// Session (tab) identifier
    #[serde(default = "generate_id")]
    pub id: String,
    /// Display title; for ssh-config sessions this is the host alias
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    /// Last known working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_path: Option<String>,
    /// Command typed into the shell once it is ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_script: Option<String>,
    /// Bookmark this session was opened from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_id: Option<String>,
    /// Collection the bookmark lives in
    #[serde(default = "default_origin")]
    pub from: String,
    #[serde(default)]
    pub source: ProfileSource,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

impl SessionProfile {
    /// A profile for a shell on the session host itself
    pub fn local() -> Self {
        Self {
            id: generate_id(),
            title: "local".to_string(),
            from: default_origin(),
            ..Default::default()
        }
    }

    /// A profile for an ad hoc remote host
    pub fn remote(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            id: generate_id(),
            title: host.clone(),
            host: Some(host),
            from: default_origin(),
            ..Default::default()
        }
    }

    /// A profile that opens `ssh <alias>` from a local shell
    pub fn ssh_config(alias: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            title: alias.into(),
            source: ProfileSource::SshConfig,
            from: default_origin(),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_start_path(mut self, path: impl Into<String>) -> Self {
        self.start_path = Some(path.into());
        self
    }

    pub fn with_login_script(mut self, script: impl Into<String>) -> Self {
        self.login_script = Some(script.into());
        self
    }

    /// Mark the profile as coming from a bookmark
    pub fn from_bookmark(mut self, src_id: impl Into<String>) -> Self {
        self.src_id = Some(src_id.into());
        self.source = ProfileSource::Bookmark;
        self
    }

    /// Whether the session is defined by an ssh config entry
    pub fn is_config_sourced(&self) -> bool {
        self.source == ProfileSource::SshConfig
    }
}
