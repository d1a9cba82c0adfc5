//! WebSocket protocol message types.
//!
//! This module defines the JSON envelopes exchanged with the session server.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`Command`] | Local → Remote | User or lifecycle command |
//! | [`Envelope`] | Remote → Local | State push, keyed by `action` |
//!
//! Both directions use a flat JSON object whose `action` field names the
//! message kind. Outbound commands add a `command` field.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound command encoder |
//! | `inbound` | Inbound envelope parsing |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound command definitions.
pub mod command;

/// Inbound envelope types.
pub mod inbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    CaptureCommand, ClickTarget, Command, InteractionCommand, NavigationCommand, ReportCommand,
    SessionCommand, ValidationCommand,
};
pub use inbound::{
    ActionKind, DataLayerMessage, Envelope, ErrorMessage, InboundMessage, ReportMessage,
    ScreenshotMessage, SessionMessage, StatusMessage, UrlChangedMessage, ValidationMessage,
};
