//! Streaming channel
//!
//! The live duplex byte stream bound to one provisioned PTY. The session side
//! holds a `StreamingChannel`; whatever carries the bytes (a WebSocket pump or
//! a test) holds the matching `RemoteEnd`.

use tokio::sync::mpsc;
use tracing::debug;

use super::{TransportError, TransportResult};
use crate::session::SessionHandle;

/// Frames travelling from the session to the remote PTY
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFrame {
    /// Input bytes for the remote shell
    Data(Vec<u8>),
    /// Local side is closing
    Close,
}

/// Events travelling from the remote PTY to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Output bytes from the remote shell
    Data(Vec<u8>),
    /// Remote side closed the channel
    Closed,
    /// The channel failed
    Error(String),
}

/// Session side of a streaming channel
#[derive(Debug)]
pub struct StreamingChannel {
    handle: SessionHandle,
    outbound: mpsc::UnboundedSender<ChannelFrame>,
    inbound: mpsc::UnboundedReceiver<ChannelEvent>,
    closed: bool,
}

/// Carrier side of a streaming channel
#[derive(Debug)]
pub struct RemoteEnd {
    /// Frames sent by the session, in order
    pub frames: mpsc::UnboundedReceiver<ChannelFrame>,
    /// Events to deliver to the session
    pub events: mpsc::UnboundedSender<ChannelEvent>,
}

impl StreamingChannel {
    /// Create a connected channel and its carrier end
    pub fn pair(handle: SessionHandle) -> (Self, RemoteEnd) {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let channel = Self {
            handle,
            outbound: frames_tx,
            inbound: events_rx,
            closed: false,
        };
        let remote = RemoteEnd {
            frames: frames_rx,
            events: events_tx,
        };
        (channel, remote)
    }

    /// Handle of the PTY this channel is bound to
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Queue bytes for the remote shell
    pub fn send(&self, data: Vec<u8>) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::ChannelClosed);
        }
        self.outbound
            .send(ChannelFrame::Data(data))
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Next event from the remote side; a vanished carrier reads as `Closed`
    pub async fn recv(&mut self) -> ChannelEvent {
        self.inbound.recv().await.unwrap_or(ChannelEvent::Closed)
    }

    /// Close the channel. Returns `true` only for the call that closed it.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        let _ = self.outbound.send(ChannelFrame::Close);
        self.inbound.close();
        debug!("Closed streaming channel for {}", self.handle);
        true
    }

    /// Record that the remote side already closed; nothing is sent
    pub fn mark_remote_closed(&mut self) {
        self.closed = true;
        self.inbound.close();
    }
}

impl Drop for StreamingChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_preserves_order() {
        let (channel, mut remote) = StreamingChannel::pair(SessionHandle::new("1"));
        channel.send(b"ls".to_vec()).unwrap();
        channel.send(b" -la".to_vec()).unwrap();
        channel.send(b"\r".to_vec()).unwrap();

        assert_eq!(remote.frames.recv().await, Some(ChannelFrame::Data(b"ls".to_vec())));
        assert_eq!(remote.frames.recv().await, Some(ChannelFrame::Data(b" -la".to_vec())));
        assert_eq!(remote.frames.recv().await, Some(ChannelFrame::Data(b"\r".to_vec())));
    }

    #[tokio::test]
    async fn test_close_is_single_shot() {
        let (mut channel, mut remote) = StreamingChannel::pair(SessionHandle::new("1"));
        assert!(channel.close());
        assert!(!channel.close());
        drop(channel);

        assert_eq!(remote.frames.recv().await, Some(ChannelFrame::Close));
        assert_eq!(remote.frames.recv().await, None);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (mut channel, _remote) = StreamingChannel::pair(SessionHandle::new("1"));
        channel.close();
        assert!(matches!(
            channel.send(b"x".to_vec()),
            Err(TransportError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_remote_close_sends_nothing() {
        let (mut channel, mut remote) = StreamingChannel::pair(SessionHandle::new("1"));
        channel.mark_remote_closed();
        assert!(!channel.close());
        drop(channel);
        assert_eq!(remote.frames.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_carrier_reads_as_closed() {
        let (mut channel, remote) = StreamingChannel::pair(SessionHandle::new("1"));
        remote.events.send(ChannelEvent::Data(b"hi".to_vec())).unwrap();
        drop(remote);
        assert_eq!(channel.recv().await, ChannelEvent::Data(b"hi".to_vec()));
        assert_eq!(channel.recv().await, ChannelEvent::Closed);
    }
}
