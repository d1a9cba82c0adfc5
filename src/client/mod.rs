//! Session client: connection manager and its command front end.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SessionClient`] | Event loop owning the connection state machine |
//! | [`SessionClientBuilder`] | Fluent configuration builder |
//! | [`SessionHandle`] | Cloneable command and subscription front end |
//! | [`ClientOptions`] | Endpoint and reconnection settings |
//!
//! # Example
//!
//! ```no_run
//! use datalayer_session::{EventKind, SessionClient, SessionEvent};
//!
//! # async fn example() -> datalayer_session::Result<()> {
//! let client = SessionClient::builder().session_id("4c1f0e7a").build()?;
//! let (handle, task) = client.spawn();
//!
//! handle.subscribe(EventKind::DataLayer, |event| {
//!     if let SessionEvent::DataLayer(event) = event {
//!         println!("{} ({})", event.event_name, event.validity.label());
//!     }
//! });
//!
//! handle.capture_datalayer().await?;
//! handle.shutdown().await;
//! task.await.ok();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for client configuration.
pub mod builder;

/// Client event loop.
pub mod core;

/// Command front end.
pub mod handle;

/// Endpoint and reconnection options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionClientBuilder;
pub use core::SessionClient;
pub use handle::SessionHandle;
pub use options::ClientOptions;
