//! Session-side model: state, statistics, events and dispatch.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SessionState`] | Client-side view of the remote session |
//! | [`StateHandle`] | Shared read access to the state |
//! | [`ValidationStats`] | Validity percentages |
//! | [`EventBus`] | Publish/subscribe keyed by [`EventKind`] |
//! | [`Dispatcher`] | Routes inbound envelopes to handlers |

// ============================================================================
// Submodules
// ============================================================================

/// Event bus.
pub mod bus;

/// Inbound message dispatcher.
pub mod dispatcher;

/// Events published on the bus.
pub mod event;

/// Session state store and connection state machine.
pub mod state;

/// Validity statistics aggregator.
pub mod stats;

// ============================================================================
// Re-exports
// ============================================================================

pub use bus::{EventBus, EventCallback};
pub use dispatcher::Dispatcher;
pub use event::{DataLayerEvent, EventKind, ReportStatus, SessionEvent, Validity};
pub use state::{ConnectionStatus, RemoteSessionStatus, SessionState, StateHandle};
pub use stats::ValidationStats;
