//! WebSocket transport and its I/O task.
//!
//! # Event Loop
//!
//! Each opened link spawns a tokio task that handles:
//!
//! - Connecting to the session endpoint
//! - Incoming text frames, forwarded to the [`EventSink`]
//! - Outgoing frames and close requests from the client
//! - Reporting how the link ended, exactly once
//! - Finishing the closing handshake, whichever side started it

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{CLOSE_NO_STATUS, CloseInfo, EventSink, Link, Transport};

// ============================================================================
// Constants
// ============================================================================

/// How long to wait for the peer to finish a closing handshake.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// LinkCommand
// ============================================================================

/// Internal commands for the link task.
enum LinkCommand {
    /// Send a text frame.
    Send(String),
    /// Start the closing handshake.
    Close { code: u16, reason: String },
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Transport over `tokio-tungstenite`.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Link>> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::transport_creation(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let runtime = Handle::try_current()
            .map_err(|e| Error::transport_creation(format!("no tokio runtime: {e}")))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        runtime.spawn(run_link(url.clone(), sink, command_rx));

        Ok(Box::new(WebSocketLink { command_tx }))
    }
}

// ============================================================================
// WebSocketLink
// ============================================================================

/// Handle to a link task. Dropping it closes the link.
struct WebSocketLink {
    command_tx: mpsc::UnboundedSender<LinkCommand>,
}

impl Link for WebSocketLink {
    fn send(&self, text: String) -> Result<()> {
        self.command_tx
            .send(LinkCommand::Send(text))
            .map_err(|_| Error::WebSocket(WsError::AlreadyClosed))
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.command_tx.send(LinkCommand::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

// ============================================================================
// Link Task
// ============================================================================

/// Connects, then pumps frames until either side closes.
async fn run_link(
    url: Url,
    sink: EventSink,
    mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
) {
    let generation = sink.generation();

    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            warn!(%generation, %url, error = %e, "WebSocket connect failed");
            sink.error(e.to_string());
            sink.closed(CloseInfo::abnormal(e.to_string()));
            return;
        }
    };

    debug!(%generation, %url, "WebSocket connected");
    sink.opened();

    let (mut ws_write, mut ws_read) = ws_stream.split();

    // The flag is set when a closing handshake is in progress.
    let (close, handshake) = loop {
        tokio::select! {
            // Incoming frames from the server
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(%generation, len = text.len(), "Frame received");
                        sink.message(text.as_str());
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(%generation, "WebSocket closed by remote");
                        let info = match frame {
                            Some(frame) => CloseInfo::clean(u16::from(frame.code), frame.reason.as_str()),
                            None => CloseInfo::clean(CLOSE_NO_STATUS, ""),
                        };
                        break (info, true);
                    }

                    Some(Err(e)) => {
                        error!(%generation, error = %e, "WebSocket error");
                        sink.error(e.to_string());
                        break (CloseInfo::abnormal(e.to_string()), false);
                    }

                    None => {
                        debug!(%generation, "WebSocket stream ended");
                        break (CloseInfo::abnormal("stream ended"), false);
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            // Commands from the client
            command = command_rx.recv() => {
                match command {
                    Some(LinkCommand::Send(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(%generation, error = %e, "Failed to send frame");
                        }
                    }

                    Some(LinkCommand::Close { code, reason }) => {
                        debug!(%generation, code, "Closing link");
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.clone().into(),
                        };
                        let sent = ws_write.send(Message::Close(Some(frame))).await.is_ok();
                        break (CloseInfo::clean(code, reason), sent);
                    }

                    None => {
                        // Link handle dropped; the client moved on.
                        let _ = ws_write.close().await;
                        debug!(%generation, "Link abandoned");
                        return;
                    }
                }
            }
        }
    };

    sink.closed(close);

    if handshake {
        finish_close(&mut ws_write, &mut ws_read).await;
    }
    debug!(%generation, "Link task terminated");
}

/// Flushes the queued close reply and reads until the peer drops the
/// connection.
async fn finish_close(
    ws_write: &mut SplitSink<WsStream, Message>,
    ws_read: &mut SplitStream<WsStream>,
) {
    let drain = async {
        let _ = ws_write.flush().await;
        while let Some(Ok(message)) = ws_read.next().await {
            trace!(?message, "Frame after close");
        }
    };

    if tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, drain).await.is_err() {
        debug!("Closing handshake timed out");
    }
}

// ============================================================================
// Tests
// ============================================================================
