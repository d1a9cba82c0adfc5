//! Cloneable front end of a running [`SessionClient`](super::SessionClient).
//!
//! Command methods validate their input locally, then hand the command to
//! the event loop and wait for its verdict. Invalid input never reaches the
//! loop.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;
use crate::protocol::Command;
use crate::session::{ConnectionStatus, EventBus, EventKind, SessionEvent, SessionState, StateHandle};
use crate::surface::{Notification, Notifier, Severity};

use super::core::ClientEvent;

// ============================================================================
// SessionHandle
// ============================================================================

/// Handle to a session client event loop.
///
/// Cloning is cheap. All clones talk to the same loop.
#[derive(Clone)]
pub struct SessionHandle {
    control_tx: mpsc::UnboundedSender<ClientEvent>,
    state: StateHandle,
    bus: EventBus,
    notifier: Arc<dyn Notifier>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("status", &self.state.connection_status())
            .field("closed", &self.control_tx.is_closed())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub(crate) fn new(
        control_tx: mpsc::UnboundedSender<ClientEvent>,
        state: StateHandle,
        bus: EventBus,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            control_tx,
            state,
            bus,
            notifier,
        }
    }
}

// ============================================================================
// State & Events
// ============================================================================

impl SessionHandle {
    /// Snapshot of the session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.snapshot()
    }

    /// Current connection status.
    #[inline]
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        self.state.connection_status()
    }

    /// Registers `callback` for events of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, callback)
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, kind: &EventKind, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(kind, id)
    }
}

// ============================================================================
// Navigation
// ============================================================================

impl SessionHandle {
    /// Navigates the remote browser to `url`.
    ///
    /// `https://` is prepended when the URL has no HTTP(S) scheme.
    ///
    /// # Errors
    ///
    /// - [`Error::CommandPrecondition`] if `url` is blank
    /// - [`Error::NotConnected`] / [`Error::InteractionDisabled`] from the loop
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.submit(Command::goto(url)).await
    }

    /// Goes back in history.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::goto`].
    pub async fn back(&self) -> Result<()> {
        self.submit(Ok(Command::back())).await
    }

    /// Goes forward in history.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::goto`].
    pub async fn forward(&self) -> Result<()> {
        self.submit(Ok(Command::forward())).await
    }

    /// Reloads the page.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::goto`].
    pub async fn reload(&self) -> Result<()> {
        self.submit(Ok(Command::reload())).await
    }
}

// ============================================================================
// Interaction
// ============================================================================

impl SessionHandle {
    /// Clicks the element matching `selector`.
    ///
    /// # Errors
    ///
    /// - [`Error::CommandPrecondition`] if `selector` is blank
    /// - [`Error::NotConnected`] / [`Error::InteractionDisabled`] from the loop
    pub async fn click(&self, selector: &str) -> Result<()> {
        self.submit(Command::click(selector)).await
    }

    /// Clicks at a point given as fractions of the viewport.
    ///
    /// # Errors
    ///
    /// - [`Error::CommandPrecondition`] unless both coordinates are in `[0, 1]`
    /// - [`Error::NotConnected`] / [`Error::InteractionDisabled`] from the loop
    pub async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        self.submit(Command::click_at(x, y)).await
    }

    /// Types `text` into the element matching `selector`.
    ///
    /// # Errors
    ///
    /// - [`Error::CommandPrecondition`] if `selector` is blank
    /// - [`Error::NotConnected`] / [`Error::InteractionDisabled`] from the loop
    pub async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.submit(Command::type_text(selector, text)).await
    }
}

// ============================================================================
// Capture, Validation & Reports
// ============================================================================

impl SessionHandle {
    /// Asks the server to capture the current DataLayer.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] / [`Error::InteractionDisabled`] from the loop.
    pub async fn capture_datalayer(&self) -> Result<()> {
        self.submit(Ok(Command::capture_datalayer())).await
    }

    /// Asks the server for a fresh screenshot.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::capture_datalayer`].
    pub async fn take_screenshot(&self) -> Result<()> {
        self.submit(Ok(Command::take_screenshot())).await
    }

    /// Requests a validation summary.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::capture_datalayer`].
    pub async fn check_validation(&self) -> Result<()> {
        self.submit(Ok(Command::check_validation())).await
    }

    /// Stops the remote session.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::capture_datalayer`].
    pub async fn stop_session(&self) -> Result<()> {
        self.submit(Ok(Command::stop_session())).await
    }

    /// Requests report generation.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::capture_datalayer`].
    pub async fn generate_report(&self, options: Map<String, Value>) -> Result<()> {
        self.submit(Ok(Command::generate_report(options))).await
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

impl SessionHandle {
    /// Reconnects after reconnection gave up or the link closed cleanly.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidTransition`] while a link is live or pending
    /// - [`Error::ClientClosed`] if the loop stopped
    pub async fn restart(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.control_tx
            .send(ClientEvent::Restart { reply })
            .map_err(|_| Error::ClientClosed)?;
        rx.await?
    }

    /// Closes the link and stops the loop. Idempotent.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.control_tx.send(ClientEvent::Shutdown { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Returns `true` once the loop stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.control_tx.is_closed()
    }

    async fn submit(&self, command: Result<Command>) -> Result<()> {
        let command = command.inspect_err(|e| {
            if let Error::CommandPrecondition { message } = e {
                self.notifier
                    .notify(Notification::new(message.clone(), Severity::Warning));
            }
        })?;

        let (reply, rx) = oneshot::channel();
        self.control_tx
            .send(ClientEvent::Command { command, reply })
            .map_err(|_| Error::ClientClosed)?;
        rx.await?
    }
}

// ============================================================================
// Tests
// ============================================================================
