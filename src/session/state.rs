//! Session State Store.
//!
//! Holds the client-side view of one remote session. The event loop in
//! [`SessionClient`](crate::client::SessionClient) is the only writer; other
//! tasks read snapshots through a [`StateHandle`].
//!
//! # Connection State Machine
//!
//! ```text
//!            ┌──────────────────────────────────────────┐
//!            ▼                                          │
//! Idle ─► Connecting ─► Open ─► Reconnecting ─► Connecting
//!            │  │         │          │
//!            │  └──► ClosedClean ◄───┘ (clean close)
//!            └─────────► Failed ─► Idle (restart)
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

use super::stats::ValidationStats;

// ============================================================================
// ConnectionStatus
// ============================================================================

/// Transport connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Never connected.
    #[default]
    Idle,
    /// Transport created, waiting for open.
    Connecting,
    /// Transport open.
    Open,
    /// Unclean close seen, reconnect timer pending.
    Reconnecting,
    /// Closed cleanly. No automatic reconnection.
    ClosedClean,
    /// Reconnection exhausted. Requires a restart.
    Failed,
}

impl ConnectionStatus {
    /// Returns `true` if moving to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionStatus::*;

        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Open | Reconnecting | ClosedClean | Failed)
                | (Open, Reconnecting | ClosedClean | Failed)
                | (Reconnecting, Connecting | ClosedClean | Failed)
                | (ClosedClean, Connecting)
                | (Failed, Idle)
        )
    }

    /// Returns `true` while a transport attempt is pending or open.
    #[inline]
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }

    /// Returns the lowercase name used in logs and messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::ClosedClean => "closed_clean",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RemoteSessionStatus
// ============================================================================

/// Lifecycle of the server-side browsing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteSessionStatus {
    /// Created, browser not started yet.
    #[default]
    Pending,
    /// Browser running.
    Active,
    /// Stopped by the user.
    Completed,
    /// Server-side failure.
    Error,
}

impl RemoteSessionStatus {
    /// Parses the wire name. Unknown names yield `None`.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Human-readable label for status badges.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }
}

// ============================================================================
// SessionState
// ============================================================================

/// Client-side view of one remote session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    /// Session this state mirrors.
    pub session_id: SessionId,
    /// Transport connection status.
    pub connection_status: ConnectionStatus,
    /// Consecutive reconnection attempts since the last successful open.
    pub reconnect_attempts: u32,
    /// Screenshots received.
    pub screenshot_count: u64,
    /// DataLayer events received.
    pub datalayer_count: u64,
    /// DataLayer events validated as valid.
    pub valid_count: u64,
    /// DataLayer events validated as invalid.
    pub invalid_count: u64,
    /// Last known remote URL.
    pub current_url: Option<String>,
    /// Server-side session lifecycle.
    pub remote_session_status: RemoteSessionStatus,
    /// Cache-busted reference to the latest screenshot.
    pub last_screenshot_url: Option<String>,
    /// Latest validation summary.
    pub validation_message: Option<String>,
    /// Latest generated report.
    pub report_url: Option<String>,
    /// Set once the session ended; outbound commands are refused.
    pub interaction_disabled: bool,
}

impl SessionState {
    /// Creates an empty state for `session_id`.
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            connection_status: ConnectionStatus::Idle,
            reconnect_attempts: 0,
            screenshot_count: 0,
            datalayer_count: 0,
            valid_count: 0,
            invalid_count: 0,
            current_url: None,
            remote_session_status: RemoteSessionStatus::Pending,
            last_screenshot_url: None,
            validation_message: None,
            report_url: None,
            interaction_disabled: false,
        }
    }

    /// Moves the connection state machine to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the table forbids the move.
    /// The status is left unchanged in that case.
    pub fn transition(&mut self, next: ConnectionStatus) -> Result<()> {
        let from = self.connection_status;

        if !from.can_transition_to(next) {
            warn!(session_id = %self.session_id, %from, to = %next, "Rejected connection transition");
            return Err(Error::invalid_transition(from, next));
        }

        self.connection_status = next;
        Ok(())
    }

    /// Computes validity percentages from the current counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> ValidationStats {
        ValidationStats::compute(self.valid_count, self.invalid_count)
    }

    /// Returns `true` if the counters satisfy `valid + invalid <= datalayer`.
    ///
    /// Servers may resync counters independently, so this can be `false`
    /// without the store being wrong.
    #[inline]
    #[must_use]
    pub fn counters_consistent(&self) -> bool {
        self.valid_count.saturating_add(self.invalid_count) <= self.datalayer_count
    }
}

// ============================================================================
// StateHandle
// ============================================================================

/// Shared, read-mostly access to a [`SessionState`].
///
/// Cloning is cheap. Only the client event loop writes through
/// [`StateHandle::update`]; everyone else takes snapshots.
#[derive(Debug, Clone)]
pub struct StateHandle {
    inner: Arc<RwLock<SessionState>>,
}

impl StateHandle {
    /// Wraps a fresh state.
    #[must_use]
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner.read().clone()
    }

    /// Reads a projection of the state without cloning all of it.
    pub fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.inner.read())
    }

    /// Current connection status.
    #[inline]
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.inner.read().connection_status
    }

    /// Mutates the state under the write lock.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.inner.write())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use ConnectionStatus::*;

    fn state() -> SessionState {
        SessionState::new(SessionId::new("s1").expect("valid id"))
    }

    #[test]
    fn test_new_state_defaults() {
        let state = state();
        assert_eq!(state.connection_status, Idle);
        assert_eq!(state.reconnect_attempts, 0);
        assert_eq!(state.datalayer_count, 0);
        assert_eq!(state.remote_session_status, RemoteSessionStatus::Pending);
        assert!(!state.interaction_disabled);
        assert!(state.counters_consistent());
    }

    #[test]
    fn test_transition_table() {
        assert!(Idle.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Open));
        assert!(Connecting.can_transition_to(Reconnecting));
        assert!(Open.can_transition_to(Reconnecting));
        assert!(Open.can_transition_to(ClosedClean));
        assert!(Reconnecting.can_transition_to(Connecting));
        assert!(Reconnecting.can_transition_to(Failed));
        assert!(Reconnecting.can_transition_to(ClosedClean));
        assert!(ClosedClean.can_transition_to(Connecting));
        assert!(Failed.can_transition_to(Idle));

        assert!(!Idle.can_transition_to(Open));
        assert!(!Open.can_transition_to(Connecting));
        assert!(!Open.can_transition_to(Open));
        assert!(!Failed.can_transition_to(Connecting));
        assert!(!Reconnecting.can_transition_to(Open));
        assert!(!Failed.can_transition_to(ClosedClean));
    }

    #[test]
    fn test_illegal_transition_keeps_status() {
        let mut state = state();
        let err = state.transition(Open).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { from: Idle, to: Open }));
        assert_eq!(state.connection_status, Idle);
    }

    #[test]
    fn test_legal_transition_sequence() {
        let mut state = state();
        for next in [Connecting, Open, Reconnecting, Connecting, Failed, Idle] {
            state.transition(next).expect("legal transition");
        }
        assert_eq!(state.connection_status, Idle);
    }

    #[test]
    fn test_remote_status_from_wire() {
        assert_eq!(
            RemoteSessionStatus::from_wire("completed"),
            Some(RemoteSessionStatus::Completed)
        );
        assert_eq!(RemoteSessionStatus::from_wire("paused"), None);
        assert_eq!(RemoteSessionStatus::Active.label(), "Active");
    }

    #[test]
    fn test_counters_consistent() {
        let mut state = state();
        state.datalayer_count = 2;
        state.valid_count = 1;
        state.invalid_count = 1;
        assert!(state.counters_consistent());

        state.invalid_count = 5;
        assert!(!state.counters_consistent());
    }

    #[test]
    fn test_state_handle_snapshot_and_update() {
        let handle = StateHandle::new(state());
        handle.update(|s| s.screenshot_count = 3);

        assert_eq!(handle.snapshot().screenshot_count, 3);
        assert_eq!(handle.read(|s| s.screenshot_count), 3);
        assert_eq!(handle.connection_status(), Idle);
    }
}
