//! Transport abstraction.
//!
//! The client never touches sockets directly. It asks a [`Transport`] to
//! open a [`Link`] and receives everything that happens on that link as
//! [`LinkEvent`]s through an [`EventSink`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   open(url, sink)   ┌──────────────────┐
//! │  SessionClient  │────────────────────►│    Transport     │
//! │   (event loop)  │                     └──────────────────┘
//! │                 │   send / close      ┌──────────────────┐      ┌────────┐
//! │                 │────────────────────►│       Link       │◄────►│ Server │
//! │                 │◄────────────────────│  (spawned task)  │      └────────┘
//! └─────────────────┘      LinkEvent      └──────────────────┘
//! ```
//!
//! Each link is tagged with a [`LinkGeneration`]. The client only acts on
//! events from the generation it opened last.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket transport and its I/O task |
//! | `memory` | In-process transport for tests and demos |

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;
use crate::identifiers::LinkGeneration;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport and its I/O task.
pub mod connection;

/// In-process transport.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::WebSocketTransport;
pub use memory::{MemoryLink, MemoryTransport};

// ============================================================================
// CloseInfo
// ============================================================================

/// Close code for a normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code sent when an endpoint goes away.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Close code for "no status received".
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code for an abnormal closure without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// How a link closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code.
    pub code: u16,
    /// Close reason. May be empty.
    pub reason: String,
    /// `true` if a closing handshake took place.
    pub clean: bool,
}

impl CloseInfo {
    /// Close after a completed handshake.
    #[must_use]
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            clean: true,
        }
    }

    /// Close without a handshake (network loss, refused connection).
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: CLOSE_ABNORMAL,
            reason: reason.into(),
            clean: false,
        }
    }

    /// Returns `true` if the close should not trigger reconnection.
    ///
    /// Code 1006 is never clean, whatever the flag says.
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.clean && self.code != CLOSE_ABNORMAL
    }

    /// Returns `true` for a normal closure (1000).
    #[inline]
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.code == CLOSE_NORMAL
    }

    /// Reason text, or the code when the reason is empty.
    #[must_use]
    pub fn describe(&self) -> String {
        if self.reason.is_empty() {
            format!("code {}", self.code)
        } else {
            self.reason.clone()
        }
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Something that happened on a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Link is open and can carry commands.
    Opened,
    /// Text frame received.
    Message(String),
    /// Link closed. Always the last event of a link.
    Closed(CloseInfo),
    /// Transport error. A `Closed` event follows.
    Error(String),
}

/// A [`TransportEvent`] tagged with the link it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    /// Link that produced the event.
    pub generation: LinkGeneration,
    /// The event.
    pub event: TransportEvent,
}

// ============================================================================
// EventSink
// ============================================================================

/// Delivers events of one link to the client event loop.
///
/// Sends never block. Events sent after the client stopped are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: LinkGeneration,
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl EventSink {
    /// Creates a sink tagging events with `generation`.
    #[must_use]
    pub fn new(generation: LinkGeneration, tx: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self { generation, tx }
    }

    /// Generation this sink tags events with.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> LinkGeneration {
        self.generation
    }

    /// Reports an open link.
    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    /// Reports an inbound text frame.
    pub fn message(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Message(text.into()));
    }

    /// Reports a closed link.
    pub fn closed(&self, info: CloseInfo) {
        self.emit(TransportEvent::Closed(info));
    }

    /// Reports a transport error.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(TransportEvent::Error(message.into()));
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send(LinkEvent {
            generation: self.generation,
            event,
        });
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Opens links to a session endpoint.
pub trait Transport: Send + Sync {
    /// Starts opening a link to `url`.
    ///
    /// Returns as soon as the attempt is under way. The outcome arrives on
    /// `sink` as `Opened` or `Closed`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportCreation`](crate::Error::TransportCreation)
    /// if the attempt cannot even be started.
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Link>>;
}

/// One open (or opening) link.
pub trait Link: Send + Sync {
    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is already gone.
    fn send(&self, text: String) -> Result<()>;

    /// Starts the closing handshake.
    fn close(&self, code: u16, reason: &str);
}

// ============================================================================
// Tests
// ============================================================================
