//! Transport module
//!
//! Request/response calls to the session host and the persistent streaming
//! channel that carries terminal bytes.

mod channel;
mod endpoint;
mod http;
mod websocket;

pub use channel::*;
pub use endpoint::*;
pub use http::*;
