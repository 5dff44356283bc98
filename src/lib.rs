//! termlink
//!
//! Client side of a remote shell session: asks a session host for a PTY over
//! HTTP, streams it over a WebSocket and keeps a local terminal surface in
//! sync with it.

pub mod config;
pub mod hooks;
pub mod session;
pub mod surface;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
