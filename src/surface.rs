//! Presentation collaborators injected into the client.
//!
//! The core never renders anything itself. It calls a [`Notifier`] for
//! user-facing messages and a [`Renderer`] for the few presentation hooks the
//! session page needs. Both are trait objects so tests can substitute doubles.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::session::{DataLayerEvent, ValidationStats};

// ============================================================================
// Severity
// ============================================================================

/// Notification severity, mirroring the page's alert styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Neutral information.
    Info,
    /// Completed action.
    Success,
    /// Rejected or degraded action.
    Warning,
    /// Failure.
    Danger,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Danger => "danger",
        })
    }
}

// ============================================================================
// Notification
// ============================================================================

/// One user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Text shown to the user.
    pub message: String,
    /// Display style.
    pub severity: Severity,
    /// How long to keep it on screen. `None` uses the surface default.
    pub duration: Option<Duration>,
}

impl Notification {
    /// Display time for terminal notifications.
    pub const PERSISTENT: Duration = Duration::from_secs(10);

    /// Creates a notification with the default duration.
    #[must_use]
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            duration: None,
        }
    }

    /// Keeps the notification on screen for [`Self::PERSISTENT`].
    #[must_use]
    pub fn persistent(mut self) -> Self {
        self.duration = Some(Self::PERSISTENT);
        self
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Surface that shows `(message, severity)` to the user.
pub trait Notifier: Send + Sync {
    /// Shows `notification`.
    fn notify(&self, notification: Notification);
}

/// Default notifier: writes notifications to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let Notification {
            message, severity, ..
        } = notification;

        match severity {
            Severity::Info | Severity::Success => info!(%severity, "{message}"),
            Severity::Warning => warn!(%severity, "{message}"),
            Severity::Danger => error!(%severity, "{message}"),
        }
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Presentation hooks called by the core. Every method defaults to a no-op.
pub trait Renderer: Send + Sync {
    /// Renders a captured DataLayer event.
    fn render_datalayer(&self, _event: &DataLayerEvent) {}

    /// Updates the validity progress bars.
    fn render_stats(&self, _stats: &ValidationStats) {}

    /// Shows or hides the loading indicator.
    fn set_loading(&self, _visible: bool) {}

    /// Disables every interactive control. Called once the session ended.
    fn disable_interaction(&self) {}
}

/// Renderer that draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

impl Renderer for NoopRenderer {}

// ============================================================================
// Tests
// ============================================================================
