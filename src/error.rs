//! Error types for the session client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use datalayer_session::{Result, SessionHandle};
//!
//! async fn example(handle: &SessionHandle) -> Result<()> {
//!     handle.goto("example.com").await?;
//!     handle.capture_datalayer().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Url`] |
//! | Connection | [`Error::TransportCreation`], [`Error::NotConnected`], [`Error::ReconnectExhausted`], [`Error::InvalidTransition`], [`Error::ClientClosed`] |
//! | Protocol | [`Error::ProtocolViolation`], [`Error::UnknownAction`], [`Error::Remote`] |
//! | Commands | [`Error::CommandPrecondition`], [`Error::InteractionDisabled`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::session::ConnectionStatus;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client configuration is invalid, including a missing
    /// session ID.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint URL could not be built.
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// The transport could not be instantiated.
    ///
    /// Fatal for this attempt only; the following close event still goes
    /// through the reconnection path.
    #[error("Transport creation failed: {message}")]
    TransportCreation {
        /// Description of the failure.
        message: String,
    },

    /// A command was attempted while the transport is not open.
    ///
    /// The command is dropped, never queued.
    #[error("Not connected (status: {status})")]
    NotConnected {
        /// Connection status at the time of the attempt.
        status: ConnectionStatus,
    },

    /// Automatic reconnection gave up.
    #[error("Reconnection failed after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of attempts made.
        attempts: u32,
    },

    /// The connection state machine refused a transition.
    #[error("Invalid connection transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: ConnectionStatus,
        /// Requested status.
        to: ConnectionStatus,
    },

    /// The client event loop is no longer running.
    #[error("Session client closed")]
    ClientClosed,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inbound text was not a well-formed envelope.
    #[error("Protocol violation: {message}")]
    ProtocolViolation {
        /// Description of the violation.
        message: String,
    },

    /// Well-formed envelope with an action outside the known set.
    #[error("Unknown action: {action}")]
    UnknownAction {
        /// The unrecognized action name.
        action: String,
    },

    /// Failure reported by the server.
    #[error("Server error: {message}")]
    Remote {
        /// Message reported by the server.
        message: String,
    },

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// An outbound command failed local validation.
    #[error("Invalid command: {message}")]
    CommandPrecondition {
        /// Description of the failed precondition.
        message: String,
    },

    /// Interaction was disabled by session completion or a terminal close.
    #[error("Interaction disabled: session has ended")]
    InteractionDisabled,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a transport creation error.
    #[inline]
    pub fn transport_creation(message: impl Into<String>) -> Self {
        Self::TransportCreation {
            message: message.into(),
        }
    }

    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(status: ConnectionStatus) -> Self {
        Self::NotConnected { status }
    }

    /// Creates a reconnect exhausted error.
    #[inline]
    pub fn reconnect_exhausted(attempts: u32) -> Self {
        Self::ReconnectExhausted { attempts }
    }

    /// Creates an invalid transition error.
    #[inline]
    pub fn invalid_transition(from: ConnectionStatus, to: ConnectionStatus) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Creates a protocol violation error.
    #[inline]
    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    /// Creates an unknown action error.
    #[inline]
    pub fn unknown_action(action: impl Into<String>) -> Self {
        Self::UnknownAction {
            action: action.into(),
        }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Creates a command precondition error.
    #[inline]
    pub fn command_precondition(message: impl Into<String>) -> Self {
        Self::CommandPrecondition {
            message: message.into(),
        }
    }
}

impl From<RecvError> for Error {
    fn from(_: RecvError) -> Self {
        Self::ClientClosed
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::TransportCreation { .. }
                | Self::NotConnected { .. }
                | Self::ReconnectExhausted { .. }
                | Self::ClientClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a protocol error.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::ProtocolViolation { .. } | Self::UnknownAction { .. } | Self::Json(_)
        )
    }

    /// Returns `true` if the user should see this error as a warning.
    ///
    /// These are the locally rejected commands.
    #[inline]
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::CommandPrecondition { .. }
                | Self::NotConnected { .. }
                | Self::InteractionDisabled
                | Self::Remote { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed once the connection comes back.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TransportCreation { .. } | Self::NotConnected { .. } | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
