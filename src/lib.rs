//! DataLayer Session - client core for interactive DataLayer inspection.
//!
//! A remote server drives a real browser and reports what happens on the
//! page: screenshots, navigations and every `dataLayer.push`, each one
//! validated against a schema. This library is the client side of that
//! session. It keeps a WebSocket open to the server, mirrors the session
//! state locally and forwards user commands back.
//!
//! # Architecture
//!
//! - **Connection manager** ([`SessionClient`]): single event loop that owns
//!   the link, reconnects after unclean closes and is the only writer of the
//!   session state
//! - **Message dispatcher** ([`Dispatcher`]): routes inbound envelopes by
//!   their `action` to one handler each
//! - **Event bus** ([`EventBus`]): typed publish/subscribe for presentation
//!   layers
//! - **Command encoder** ([`Command`]): validated outbound commands
//!
//! # Quick Start
//!
//! ```no_run
//! use datalayer_session::{ClientOptions, EventKind, Result, SessionClient, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = SessionClient::builder()
//!         .session_id("4c1f0e7a")
//!         .options(ClientOptions::new().with_host("localhost:8000"))
//!         .build()?;
//!
//!     let (handle, task) = client.spawn();
//!
//!     handle.subscribe(EventKind::Stats, |event| {
//!         if let SessionEvent::Stats(stats) = event {
//!             println!("{}", stats.message);
//!         }
//!     });
//!
//!     handle.goto("shop.example.com").await?;
//!     handle.capture_datalayer().await?;
//!
//!     handle.shutdown().await;
//!     task.await.ok();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Connection manager, builder, handle and options |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Inbound envelopes and outbound commands |
//! | [`session`] | State store, stats, event bus and dispatcher |
//! | [`surface`] | Notifier and renderer collaborators |
//! | [`transport`] | Transport abstraction, WebSocket and in-memory links |

// ============================================================================
// Modules
// ============================================================================

/// Connection manager and its command front end.
///
/// Use [`SessionClient::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire message types.
pub mod protocol;

/// Session state, statistics, events and dispatch.
pub mod session;

/// Presentation collaborators.
pub mod surface;

/// Transport layer.
///
/// [`WebSocketTransport`] for real servers, [`MemoryTransport`] for tests
/// and demos.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ClientOptions, SessionClient, SessionClientBuilder, SessionHandle};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{LinkGeneration, SessionId, SubscriptionId};

// Protocol types
pub use protocol::{ActionKind, Command, Envelope, InboundMessage};

// Session types
pub use session::{
    ConnectionStatus, DataLayerEvent, Dispatcher, EventBus, EventKind, RemoteSessionStatus,
    ReportStatus, SessionEvent, SessionState, StateHandle, ValidationStats, Validity,
};

// Surface types
pub use surface::{NoopRenderer, Notification, Notifier, Renderer, Severity, TracingNotifier};

// Transport types
pub use transport::{
    CloseInfo, EventSink, Link, LinkEvent, MemoryLink, MemoryTransport, Transport,
    TransportEvent, WebSocketTransport,
};
