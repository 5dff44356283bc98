//! Configuration module
//!
//! Handles loading the client configuration and saved connection profiles.

mod client;
mod profile;

pub use client::*;
pub use profile::*;
