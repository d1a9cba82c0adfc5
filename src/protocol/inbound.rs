//! Inbound envelopes (server → client).
//!
//! Every inbound message is a JSON object with a string `action` field.
//! The action selects one of a closed set of typed bodies.
//!
//! # Format
//!
//! ```json
//! {
//!   "action": "datalayer",
//!   "event": "purchase",
//!   "timestamp": "2024-05-01T10:00:00+00:00",
//!   "data": { "event": "purchase", "value": 10 },
//!   "valid": true,
//!   "errors": []
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::session::{DataLayerEvent, Validity};

// ============================================================================
// Constants
// ============================================================================

/// Event name used when a DataLayer push carries none.
pub const DEFAULT_EVENT_NAME: &str = "dataLayer Push";

// ============================================================================
// ActionKind
// ============================================================================

/// Discriminant of an inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// New screenshot available.
    Screenshot,
    /// DataLayer push captured.
    DataLayer,
    /// Remote page navigated.
    UrlChanged,
    /// Absolute state resync.
    Status,
    /// Validation summary.
    Validation,
    /// Remote session lifecycle.
    Session,
    /// Report generation outcome.
    Report,
    /// Server-reported failure.
    Error,
    /// Anything else, kept verbatim.
    Unknown(String),
}

impl ActionKind {
    /// Maps a wire name to its kind.
    #[must_use]
    pub fn from_wire(action: &str) -> Self {
        match action {
            "screenshot" => Self::Screenshot,
            "datalayer" => Self::DataLayer,
            "url_changed" => Self::UrlChanged,
            "status" => Self::Status,
            "validation" => Self::Validation,
            "session" => Self::Session,
            "report" => Self::Report,
            "error" => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire name of this kind.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Screenshot => "screenshot",
            Self::DataLayer => "datalayer",
            Self::UrlChanged => "url_changed",
            Self::Status => "status",
            Self::Validation => "validation",
            Self::Session => "session",
            Self::Report => "report",
            Self::Error => "error",
            Self::Unknown(action) => action,
        }
    }

    /// Returns `true` for actions outside the known set.
    #[inline]
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// A parsed inbound envelope: its action plus the full JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Declared action.
    pub action: ActionKind,
    /// Whole envelope, `action` included.
    pub body: Value,
}

impl Envelope {
    /// Parses raw transport text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if the text is not a JSON object
    /// or its `action` is missing or not a string.
    pub fn parse(text: &str) -> Result<Self> {
        let body: Value = serde_json::from_str(text)
            .map_err(|e| Error::protocol_violation(format!("invalid JSON: {e}")))?;

        Self::from_value(body)
    }

    /// Wraps already-parsed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if `body` is not an object or its
    /// `action` is missing or not a string.
    pub fn from_value(body: Value) -> Result<Self> {
        let Some(object) = body.as_object() else {
            return Err(Error::protocol_violation("envelope is not a JSON object"));
        };

        let action = match object.get("action") {
            Some(Value::String(action)) => ActionKind::from_wire(action),
            Some(other) => {
                return Err(Error::protocol_violation(format!(
                    "action must be a string, got {other}"
                )));
            }
            None => return Err(Error::protocol_violation("missing action")),
        };

        Ok(Self { action, body })
    }

    /// Decodes the body into a typed message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if a field has the wrong type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.body).map_err(|e| {
            Error::protocol_violation(format!("malformed '{}' message: {e}", self.action))
        })
    }

    /// Converts into the typed message for its action.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if the body does not match the
    /// action's schema.
    pub fn into_message(self) -> Result<InboundMessage> {
        let message = match &self.action {
            ActionKind::Screenshot => InboundMessage::Screenshot(self.decode()?),
            ActionKind::DataLayer => InboundMessage::DataLayer(self.decode()?),
            ActionKind::UrlChanged => InboundMessage::UrlChanged(self.decode()?),
            ActionKind::Status => InboundMessage::Status(self.decode()?),
            ActionKind::Validation => InboundMessage::Validation(self.decode()?),
            ActionKind::Session => InboundMessage::Session(self.decode()?),
            ActionKind::Report => InboundMessage::Report(self.decode()?),
            ActionKind::Error => InboundMessage::Error(self.decode()?),
            ActionKind::Unknown(action) => InboundMessage::Unknown {
                action: action.clone(),
                envelope: self.body,
            },
        };

        Ok(message)
    }
}

// ============================================================================
// InboundMessage
// ============================================================================

/// Typed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `screenshot`
    Screenshot(ScreenshotMessage),
    /// `datalayer`
    DataLayer(DataLayerMessage),
    /// `url_changed`
    UrlChanged(UrlChangedMessage),
    /// `status`
    Status(StatusMessage),
    /// `validation`
    Validation(ValidationMessage),
    /// `session`
    Session(SessionMessage),
    /// `report`
    Report(ReportMessage),
    /// `error`
    Error(ErrorMessage),
    /// Unrecognized action.
    Unknown {
        /// Raw action name.
        action: String,
        /// Whole envelope.
        envelope: Value,
    },
}

// ============================================================================
// Message Bodies
// ============================================================================

/// `screenshot` body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScreenshotMessage {
    /// Stored image location.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// `datalayer` body.
///
/// `id`, `timestamp` and `errors` are display-only and kept loosely typed:
/// an odd shape there never costs the push its count.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DataLayerMessage {
    /// Server record ID, string or number.
    #[serde(default)]
    pub id: Option<Value>,
    /// Inferred event name.
    #[serde(default)]
    pub event: Option<String>,
    /// Capture time, ISO 8601 string or epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<Value>,
    /// Pushed object.
    #[serde(default)]
    pub data: Value,
    /// `true`/`false`, or absent/null when not evaluated.
    #[serde(default)]
    pub valid: Option<bool>,
    /// Validation errors, normally an array.
    #[serde(default)]
    pub errors: Option<Value>,
}

impl DataLayerMessage {
    /// Builds the subscriber-facing event.
    ///
    /// `received_at` fills in a missing or unparsable timestamp.
    #[must_use]
    pub fn into_event(self, received_at: DateTime<Utc>) -> DataLayerEvent {
        let timestamp = self
            .timestamp
            .as_ref()
            .and_then(timestamp_from_value)
            .unwrap_or(received_at);

        let errors = match self.errors {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.into_iter().map(value_text).collect(),
            Some(other) => vec![value_text(other)],
        };

        let id = match self.id {
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };

        DataLayerEvent {
            id,
            event_name: self
                .event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            timestamp,
            payload: self.data,
            validity: Validity::from(self.valid),
            errors,
        }
    }
}

/// `url_changed` body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UrlChangedMessage {
    /// New URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// `status` body. Present counters overwrite the local ones.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusMessage {
    /// Current URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Current URL, older field name.
    #[serde(default)]
    pub current_url: Option<String>,
    /// Absolute screenshot count.
    #[serde(default)]
    pub screenshot_count: Option<u64>,
    /// Absolute DataLayer count.
    #[serde(default)]
    pub datalayer_count: Option<u64>,
    /// Absolute valid count.
    #[serde(default)]
    pub valid_count: Option<u64>,
    /// Absolute invalid count.
    #[serde(default)]
    pub invalid_count: Option<u64>,
    /// Remote session status name.
    #[serde(default)]
    pub session_status: Option<String>,
}

impl StatusMessage {
    /// URL from either field name, `url` first.
    #[must_use]
    pub fn effective_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.current_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}

/// `validation` body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ValidationMessage {
    /// Absolute valid count.
    #[serde(default)]
    pub valid_count: Option<u64>,
    /// Absolute invalid count.
    #[serde(default)]
    pub invalid_count: Option<u64>,
    /// Server-side total, informational.
    #[serde(default)]
    pub total: Option<u64>,
    /// Summary text.
    #[serde(default)]
    pub message: Option<String>,
}

/// `session` body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionMessage {
    /// Remote session status name.
    #[serde(default)]
    pub status: Option<String>,
    /// Summary text.
    #[serde(default)]
    pub message: Option<String>,
}

/// `report` body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReportMessage {
    /// `generated` or `error`.
    #[serde(default)]
    pub status: Option<String>,
    /// Report location.
    #[serde(default)]
    pub report_url: Option<String>,
    /// Report ID.
    #[serde(default)]
    pub report_id: Option<String>,
    /// Summary text.
    #[serde(default)]
    pub message: Option<String>,
}

/// `error` body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorMessage {
    /// Failure description.
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

/// String timestamps are parsed, numbers are epoch milliseconds.
fn timestamp_from_value(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(raw) => parse_timestamp(raw),
        Value::Number(millis) => millis
            .as_i64()
            .or_else(|| millis.as_f64().map(|m| m as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Parses RFC 3339 timestamps, or naive ISO 8601 ones taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

// ============================================================================
// Tests
// ============================================================================
