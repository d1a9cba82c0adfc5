//! Outbound commands (client → server).
//!
//! Every command serializes to `{ "action": ..., "command": ..., ...params }`.
//! Constructors validate their own preconditions, so a [`Command`] that
//! exists is always fit to send.
//!
//! # Command Set
//!
//! | Action | Commands |
//! |--------|----------|
//! | `init` | (no command) `sessionId` |
//! | `navigation` | `back`, `forward`, `reload`, `goto` |
//! | `interaction` | `click` (selector or point), `type` |
//! | `capture` | `datalayer`, `screenshot` |
//! | `validation` | `check` |
//! | `session` | `stop` |
//! | `report` | `generate` |

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// Constants
// ============================================================================

/// Matches URLs that already carry an HTTP(S) scheme.
static HTTP_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("static regex"));

/// Scheme prepended to bare hosts.
const DEFAULT_SCHEME: &str = "https://";

// ============================================================================
// Command Wrapper
// ============================================================================

/// All outbound commands, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    /// Sent on every successful open.
    Init {
        /// Session being mirrored.
        #[serde(rename = "sessionId")]
        session_id: SessionId,
    },
    /// Browser navigation.
    Navigation(NavigationCommand),
    /// Page interaction.
    Interaction(InteractionCommand),
    /// On-demand capture.
    Capture(CaptureCommand),
    /// Validation summary request.
    Validation(ValidationCommand),
    /// Remote session control.
    Session(SessionCommand),
    /// Report generation.
    Report(ReportCommand),
}

// ============================================================================
// Per-Action Commands
// ============================================================================

/// `navigation` commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum NavigationCommand {
    /// History back.
    Back,
    /// History forward.
    Forward,
    /// Reload page.
    Reload,
    /// Load URL.
    Goto {
        /// Absolute URL with scheme.
        url: String,
    },
}

/// `interaction` commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum InteractionCommand {
    /// Click an element or a point.
    Click {
        /// What to click.
        #[serde(flatten)]
        target: ClickTarget,
    },
    /// Type into an element.
    Type {
        /// CSS selector.
        selector: String,
        /// Text to type, possibly empty.
        text: String,
    },
}

/// Target of a click.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClickTarget {
    /// Element by CSS selector.
    Selector {
        /// CSS selector.
        selector: String,
    },
    /// Point relative to the viewport, both axes in `[0, 1]`.
    Point {
        /// Horizontal fraction.
        x: f64,
        /// Vertical fraction.
        y: f64,
    },
}

/// `capture` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CaptureCommand {
    /// Capture the page's DataLayer.
    #[serde(rename = "datalayer")]
    DataLayer,
    /// Capture a screenshot.
    Screenshot,
}

/// `validation` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ValidationCommand {
    /// Ask for current validation stats.
    Check,
}

/// `session` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    /// End the remote session.
    Stop,
}

/// `report` commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ReportCommand {
    /// Generate a report.
    Generate {
        /// Free-form report options.
        options: Map<String, Value>,
    },
}

// ============================================================================
// Validated Constructors
// ============================================================================

impl Command {
    /// `init` for `session_id`.
    #[inline]
    #[must_use]
    pub fn init(session_id: SessionId) -> Self {
        Self::Init { session_id }
    }

    /// `navigation/goto`.
    ///
    /// Trims the URL and prepends `https://` when no HTTP(S) scheme is given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandPrecondition`] if the URL is blank.
    pub fn goto(url: &str) -> Result<Self> {
        let url = url.trim();

        if url.is_empty() {
            return Err(Error::command_precondition("Please enter a valid URL."));
        }

        let url = if HTTP_SCHEME.is_match(url) {
            url.to_string()
        } else {
            format!("{DEFAULT_SCHEME}{url}")
        };

        Ok(Self::Navigation(NavigationCommand::Goto { url }))
    }

    /// `navigation/back`.
    #[inline]
    #[must_use]
    pub fn back() -> Self {
        Self::Navigation(NavigationCommand::Back)
    }

    /// `navigation/forward`.
    #[inline]
    #[must_use]
    pub fn forward() -> Self {
        Self::Navigation(NavigationCommand::Forward)
    }

    /// `navigation/reload`.
    #[inline]
    #[must_use]
    pub fn reload() -> Self {
        Self::Navigation(NavigationCommand::Reload)
    }

    /// `interaction/click` on a selector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandPrecondition`] if the selector is blank.
    pub fn click(selector: &str) -> Result<Self> {
        let selector = require_selector(selector)?;
        Ok(Self::Interaction(InteractionCommand::Click {
            target: ClickTarget::Selector { selector },
        }))
    }

    /// `interaction/click` at a relative point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandPrecondition`] unless both coordinates are
    /// finite and within `[0, 1]`.
    pub fn click_at(x: f64, y: f64) -> Result<Self> {
        let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);

        if !in_range(x) || !in_range(y) {
            return Err(Error::command_precondition(format!(
                "Click coordinates must be within [0, 1], got ({x}, {y})"
            )));
        }

        Ok(Self::Interaction(InteractionCommand::Click {
            target: ClickTarget::Point { x, y },
        }))
    }

    /// `interaction/type`. Empty text is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandPrecondition`] if the selector is blank.
    pub fn type_text(selector: &str, text: impl Into<String>) -> Result<Self> {
        let selector = require_selector(selector)
            .map_err(|_| Error::command_precondition("Selector and text are required."))?;

        Ok(Self::Interaction(InteractionCommand::Type {
            selector,
            text: text.into(),
        }))
    }

    /// `capture/datalayer`.
    #[inline]
    #[must_use]
    pub fn capture_datalayer() -> Self {
        Self::Capture(CaptureCommand::DataLayer)
    }

    /// `capture/screenshot`.
    #[inline]
    #[must_use]
    pub fn take_screenshot() -> Self {
        Self::Capture(CaptureCommand::Screenshot)
    }

    /// `validation/check`.
    #[inline]
    #[must_use]
    pub fn check_validation() -> Self {
        Self::Validation(ValidationCommand::Check)
    }

    /// `session/stop`.
    #[inline]
    #[must_use]
    pub fn stop_session() -> Self {
        Self::Session(SessionCommand::Stop)
    }

    /// `report/generate` with `options`.
    #[inline]
    #[must_use]
    pub fn generate_report(options: Map<String, Value>) -> Self {
        Self::Report(ReportCommand::Generate { options })
    }
}

// ============================================================================
// Command Properties
// ============================================================================

impl Command {
    /// Wire name of the `action` field.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Navigation(_) => "navigation",
            Self::Interaction(_) => "interaction",
            Self::Capture(_) => "capture",
            Self::Validation(_) => "validation",
            Self::Session(_) => "session",
            Self::Report(_) => "report",
        }
    }

    /// Returns `true` if the UI should show a loading indicator after sending.
    #[must_use]
    pub fn shows_loading(&self) -> bool {
        matches!(
            self,
            Self::Navigation(_) | Self::Interaction(_) | Self::Capture(CaptureCommand::Screenshot)
        )
    }

    /// Returns `true` for user-issued commands, refused once interaction is
    /// disabled. `init` is the only protocol-internal command.
    #[inline]
    #[must_use]
    pub fn is_user_command(&self) -> bool {
        !matches!(self, Self::Init { .. })
    }

    /// Serializes to envelope text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn require_selector(selector: &str) -> Result<String> {
    let selector = selector.trim();

    if selector.is_empty() {
        return Err(Error::command_precondition("Selector is required."));
    }

    Ok(selector.to_string())
}

// ============================================================================
// Tests
// ============================================================================
