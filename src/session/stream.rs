//! Stream adapter
//!
//! Owns the streaming channel of a session once provisioning succeeded, along
//! with the deferred initial command and the one-shot working directory
//! detection.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Sleep};
use tracing::{debug, warn};

use super::{extract_start_path, Geometry, SessionHandle};
use crate::surface::LocalSurface;
use crate::transport::{StreamingChannel, Transport};

/// Command typed into the shell once its timer fires
struct InitCommand {
    line: String,
    timer: Pin<Box<Sleep>>,
}

/// Binds a streaming channel to the local surface
pub struct StreamAdapter {
    channel: StreamingChannel,
    init: Option<InitCommand>,
    path_detected: bool,
}

impl StreamAdapter {
    pub fn new(channel: StreamingChannel) -> Self {
        Self {
            channel,
            init: None,
            path_detected: false,
        }
    }

    /// Schedule `line` to be sent after `delay`
    pub fn with_init_command(mut self, line: String, delay: Duration) -> Self {
        self.init = Some(InitCommand {
            line,
            timer: Box::pin(sleep(delay)),
        });
        self
    }

    pub fn handle(&self) -> &SessionHandle {
        self.channel.handle()
    }

    pub fn has_pending_init(&self) -> bool {
        self.init.is_some()
    }

    /// Forward local input to the remote shell
    pub fn send_input(&self, data: Vec<u8>) {
        if let Err(e) = self.channel.send(data) {
            warn!("Dropped input for {}: {}", self.handle(), e);
        }
    }

    /// Render remote output on the surface
    pub fn deliver_output(&self, surface: &mut dyn LocalSurface, data: &[u8]) {
        if let Err(e) = surface.write(data) {
            warn!("Failed to render output of {}: {}", self.handle(), e);
        }
    }

    /// Wait for the next channel event and the init timer at once
    pub(crate) async fn next(&mut self) -> StreamEvent {
        let Self { channel, init, .. } = self;
        let init_due = async {
            match init {
                Some(cmd) => cmd.timer.as_mut().await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            event = channel.recv() => StreamEvent::Channel(event),
            _ = init_due => StreamEvent::InitDue,
        }
    }

    /// Send the initial command, if one is still scheduled
    pub fn fire_init_command(&mut self) {
        if let Some(cmd) = self.init.take() {
            debug!("Sending initial command to {}", self.handle());
            self.send_input(cmd.line.into_bytes());
        }
    }

    /// Look for a working directory in a refreshed line; reports a path once
    pub fn detect_path(&mut self, line: &str) -> Option<String> {
        if self.path_detected {
            return None;
        }
        let path = extract_start_path(line)?;
        self.path_detected = true;
        Some(path)
    }

    /// Fire-and-forget resize notification
    pub fn notify_resize(&self, transport: &Arc<dyn Transport>, geometry: Geometry) {
        let transport = Arc::clone(transport);
        let handle = self.handle().clone();
        debug!("Resizing {} to {}", handle, geometry);
        tokio::spawn(async move {
            if let Err(e) = transport.resize(&handle, geometry).await {
                warn!("Resize of {} to {} failed: {}", handle, geometry, e);
            }
        });
    }

    /// The remote side closed; nothing must be sent back
    pub fn mark_remote_closed(&mut self) {
        self.channel.mark_remote_closed();
    }

    /// Cancel the pending init command and close the channel.
    /// Returns `true` if a close was sent.
    pub fn shutdown(mut self) -> bool {
        if self.init.take().is_some() {
            debug!("Cancelled initial command for {}", self.handle());
        }
        self.channel.close()
    }
}

/// What woke the adapter up
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    Channel(crate::transport::ChannelEvent),
    InitDue,
}
