//! Typed payloads published on the event bus.
//!
//! # Event Kinds
//!
//! | Kind | Source | Payload |
//! |------|--------|---------|
//! | `Connection` | transport open/close | connected flag, close code |
//! | `Reconnecting` | unclean close | attempt counter |
//! | `ReconnectExhausted` | attempt cap reached | attempts made |
//! | `Screenshot` | `screenshot` | cache-busted URL |
//! | `DataLayer` | `datalayer` | [`DataLayerEvent`] |
//! | `UrlChanged` | `url_changed` | URL |
//! | `Status` | `status` | state snapshot |
//! | `Validation` | `validation` | message |
//! | `Stats` | aggregator | [`ValidationStats`] |
//! | `Session` | `session` | remote status |
//! | `Report` | `report` | report status and URL |
//! | `Error` | `error`, failed `report` | message |
//! | `Other(action)` | unrecognized action | raw envelope |

// ============================================================================
// Imports
// ============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::state::{RemoteSessionStatus, SessionState};
use super::stats::ValidationStats;

// ============================================================================
// Validity
// ============================================================================

/// Tri-state validation result of a DataLayer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    /// Not evaluated yet.
    #[default]
    Unknown,
    /// Passed validation.
    Valid,
    /// Failed validation.
    Invalid,
}

impl From<Option<bool>> for Validity {
    fn from(valid: Option<bool>) -> Self {
        match valid {
            Some(true) => Self::Valid,
            Some(false) => Self::Invalid,
            None => Self::Unknown,
        }
    }
}

impl Validity {
    /// Badge label shown next to the event.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Pending",
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
        }
    }
}

// ============================================================================
// DataLayerEvent
// ============================================================================

/// One captured DataLayer push, as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataLayerEvent {
    /// Server record ID, if provided.
    pub id: Option<String>,
    /// Event name (`dataLayer Push` when absent).
    pub event_name: String,
    /// Capture time, or receipt time when absent.
    pub timestamp: DateTime<Utc>,
    /// Opaque pushed object.
    pub payload: Value,
    /// Validation result.
    pub validity: Validity,
    /// Validation errors, in server order.
    pub errors: Vec<String>,
}

impl DataLayerEvent {
    /// Pretty-printed payload for display.
    #[must_use]
    pub fn payload_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.payload).unwrap_or_else(|_| self.payload.to_string())
    }
}

// ============================================================================
// ReportStatus
// ============================================================================

/// Outcome of a report generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Report is available.
    Generated,
    /// Generation failed.
    Error,
    /// Status this client does not know about.
    Other(String),
}

impl ReportStatus {
    /// Parses the wire name.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "generated" => Self::Generated,
            "error" => Self::Error,
            other => Self::Other(other.to_string()),
        }
    }
}

// ============================================================================
// EventKind
// ============================================================================

/// Subscription key for the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Transport opened or closed.
    Connection,
    /// Reconnection attempt scheduled.
    Reconnecting,
    /// Reconnection gave up.
    ReconnectExhausted,
    /// New screenshot.
    Screenshot,
    /// New DataLayer event.
    DataLayer,
    /// Remote URL changed.
    UrlChanged,
    /// Full status resync.
    Status,
    /// Validation message.
    Validation,
    /// Recomputed validity percentages.
    Stats,
    /// Remote session lifecycle change.
    Session,
    /// Report generation outcome.
    Report,
    /// Server-reported error.
    Error,
    /// Unrecognized action, keyed by its raw name.
    Other(String),
}

impl EventKind {
    /// Kind for a raw inbound action name.
    #[must_use]
    pub fn other(action: impl Into<String>) -> Self {
        Self::Other(action.into())
    }
}

// ============================================================================
// SessionEvent
// ============================================================================

/// Event published on the bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Transport opened or closed.
    Connection {
        /// `true` on open.
        connected: bool,
        /// Close code, on close.
        code: Option<u16>,
    },

    /// Reconnection attempt scheduled.
    Reconnecting {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Attempt cap.
        max_attempts: u32,
    },

    /// Reconnection gave up. Restart required.
    ReconnectExhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// New screenshot.
    Screenshot {
        /// Cache-busted image URL.
        image_url: String,
        /// Screenshot counter after the update.
        count: u64,
    },

    /// New DataLayer event.
    DataLayer(DataLayerEvent),

    /// Remote URL changed.
    UrlChanged {
        /// New URL.
        url: String,
    },

    /// Full status resync.
    Status(Box<SessionState>),

    /// Validation message.
    Validation {
        /// Message shown to the user.
        message: Option<String>,
    },

    /// Recomputed validity percentages.
    Stats(ValidationStats),

    /// Remote session lifecycle change.
    Session {
        /// New remote status.
        status: RemoteSessionStatus,
        /// Server message.
        message: Option<String>,
    },

    /// Report generation outcome.
    Report {
        /// Outcome.
        status: ReportStatus,
        /// Report location when generated.
        report_url: Option<String>,
        /// Server message.
        message: Option<String>,
    },

    /// Server-reported error.
    Error {
        /// Error message.
        message: String,
    },

    /// Unrecognized action, republished unchanged.
    Unrecognized {
        /// Raw action name.
        action: String,
        /// Whole envelope.
        envelope: Value,
    },
}

impl SessionEvent {
    /// Bus key this event is delivered under.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connection { .. } => EventKind::Connection,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::ReconnectExhausted { .. } => EventKind::ReconnectExhausted,
            Self::Screenshot { .. } => EventKind::Screenshot,
            Self::DataLayer(_) => EventKind::DataLayer,
            Self::UrlChanged { .. } => EventKind::UrlChanged,
            Self::Status(_) => EventKind::Status,
            Self::Validation { .. } => EventKind::Validation,
            Self::Stats(_) => EventKind::Stats,
            Self::Session { .. } => EventKind::Session,
            Self::Report { .. } => EventKind::Report,
            Self::Error { .. } => EventKind::Error,
            Self::Unrecognized { action, .. } => EventKind::other(action.as_str()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
