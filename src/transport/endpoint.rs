//! Session host endpoint and the transport seam
//!
//! Everything the session needs from the network goes through the `Transport`
//! trait so the lifecycle can be driven against an in-memory host in tests.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::StreamingChannel;
use crate::session::{Geometry, SessionHandle};

/// Errors that can occur while talking to the session host
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Address of the session-hosting endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `POST` target for provisioning
    pub fn terminals_url(&self) -> String {
        format!("http://{}:{}/terminals", self.host, self.port)
    }

    /// `POST` target for resize notifications
    pub fn resize_url(&self, handle: &SessionHandle, geometry: Geometry) -> String {
        format!(
            "http://{}:{}/terminals/{}/size?cols={}&rows={}",
            self.host, self.port, handle, geometry.cols, geometry.rows
        )
    }

    /// Streaming channel address for a provisioned session
    pub fn socket_url(&self, handle: &SessionHandle) -> String {
        format!("ws://{}:{}/terminals/{}", self.host, self.port, handle)
    }
}

/// Error payload of a rejected provisioning request
#[derive(Debug, Clone, PartialEq)]
pub enum FailureBody {
    Text(String),
    Json(Value),
}

impl FailureBody {
    /// Interpret a response body: JSON objects and arrays stay structured,
    /// everything else is kept as raw text.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => FailureBody::Json(value),
            _ => FailureBody::Text(raw.to_string()),
        }
    }

    /// Textual form used for classification; structured bodies are serialized
    pub fn as_text(&self) -> String {
        match self {
            FailureBody::Text(text) => text.clone(),
            FailureBody::Json(value) => value.to_string(),
        }
    }
}

/// Raw answer of the session host to a provisioning request
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisionReply {
    /// 2xx response; the body should hold the process id
    Accepted(Value),
    /// Non-2xx response
    Rejected(FailureBody),
}

/// Network operations of one session host
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ask the host to allocate a PTY
    async fn provision(&self, body: &Value) -> TransportResult<ProvisionReply>;

    /// Tell the host the terminal changed size
    async fn resize(&self, handle: &SessionHandle, geometry: Geometry) -> TransportResult<()>;

    /// Open the streaming channel for a provisioned PTY.
    ///
    /// Returns immediately; connection failures arrive as channel events.
    fn open_channel(&self, handle: &SessionHandle) -> StreamingChannel;
}
