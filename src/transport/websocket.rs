//! WebSocket carrier for streaming channels
//!
//! Connects to the session host and relays frames between the socket and a
//! `RemoteEnd` until either side closes.

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::{ChannelEvent, ChannelFrame, RemoteEnd, StreamingChannel, TransportResult};
use crate::session::SessionHandle;

/// Open a streaming channel backed by a WebSocket at `url`.
///
/// The socket is connected in a background task. Frames queued before the
/// connection is up are delivered once it is.
pub fn open(url: String, handle: SessionHandle) -> StreamingChannel {
    let (channel, remote) = StreamingChannel::pair(handle.clone());

    tokio::spawn(async move {
        let events = remote.events.clone();
        if let Err(e) = relay(&url, remote).await {
            error!("WebSocket error for {}: {}", handle, e);
            let _ = events.send(ChannelEvent::Error(e.to_string()));
        }
    });

    channel
}

/// Relay loop; returns `Ok` once the channel is closed from either side
async fn relay(url: &str, remote: RemoteEnd) -> TransportResult<()> {
    let RemoteEnd { mut frames, events } = remote;

    let (ws_stream, _) = connect_async(url).await?;
    info!("Connected to {}", url);
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            // Local input and close requests
            frame = frames.recv() => {
                match frame {
                    Some(ChannelFrame::Data(data)) => {
                        ws_sender.send(to_message(data)).await?;
                    }
                    Some(ChannelFrame::Close) | None => {
                        debug!("Closing socket {}", url);
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            // Remote output
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = events.send(ChannelEvent::Data(text.into_bytes()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let _ = events.send(ChannelEvent::Data(data));
                    }
                    Some(Ok(Message::Ping(data))) => {
                        ws_sender.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pong messages
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Host closed socket {}", url);
                        let _ = events.send(ChannelEvent::Closed);
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {
                        // Raw frame, ignore
                    }
                    Some(Err(e)) => {
                        warn!("Socket {} failed: {}", url, e);
                        let _ = events.send(ChannelEvent::Error(e.to_string()));
                        break;
                    }
                    None => {
                        let _ = events.send(ChannelEvent::Closed);
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Keystrokes are normally UTF-8 and go out as text frames
fn to_message(data: Vec<u8>) -> Message {
    match String::from_utf8(data) {
        Ok(text) => Message::Text(text),
        Err(e) => Message::Binary(e.into_bytes()),
    }
}
