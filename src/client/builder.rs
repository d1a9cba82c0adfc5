//! Builder pattern for client configuration.
//!
//! # Example
//!
//! ```no_run
//! use datalayer_session::{ClientOptions, SessionClient};
//!
//! # async fn example() -> datalayer_session::Result<()> {
//! let client = SessionClient::builder()
//!     .session_id("4c1f0e7a")
//!     .options(ClientOptions::new().with_host("tags.example.com").with_secure())
//!     .build()?;
//!
//! let (handle, _task) = client.spawn();
//! handle.goto("shop.example.com").await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::surface::{NoopRenderer, Notifier, Renderer, TracingNotifier};
use crate::transport::{Transport, WebSocketTransport};

use super::core::SessionClient;
use super::options::ClientOptions;

// ============================================================================
// SessionClientBuilder
// ============================================================================

/// Builder for configuring a [`SessionClient`].
///
/// Use [`SessionClient::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct SessionClientBuilder {
    /// Raw session ID, validated on build.
    session_id: Option<String>,
    /// Connection options.
    options: ClientOptions,
    /// Transport override.
    transport: Option<Arc<dyn Transport>>,
    /// Notifier override.
    notifier: Option<Arc<dyn Notifier>>,
    /// Renderer override.
    renderer: Option<Arc<dyn Renderer>>,
}

impl fmt::Debug for SessionClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClientBuilder")
            .field("session_id", &self.session_id)
            .field("options", &self.options)
            .field("custom_transport", &self.transport.is_some())
            .field("custom_notifier", &self.notifier.is_some())
            .field("custom_renderer", &self.renderer.is_some())
            .finish()
    }
}

// ============================================================================
// SessionClientBuilder Implementation
// ============================================================================

impl SessionClientBuilder {
    /// Creates a builder with default options and no session ID.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session to connect to.
    #[inline]
    #[must_use]
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Replaces the connection options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the transport. Defaults to [`WebSocketTransport`].
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets the notifier. Defaults to [`TracingNotifier`].
    #[inline]
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Sets the renderer. Defaults to [`NoopRenderer`].
    #[inline]
    #[must_use]
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the session ID is missing or blank
    /// - [`Error::Config`] if the options are invalid
    /// - [`Error::Url`] if no endpoint URL can be formed
    pub fn build(self) -> Result<SessionClient> {
        let session_id = self.validate_session_id()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(WebSocketTransport),
        };
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(TracingNotifier),
        };
        let renderer: Arc<dyn Renderer> = match self.renderer {
            Some(renderer) => renderer,
            None => Arc::new(NoopRenderer),
        };

        SessionClient::new(session_id, self.options, transport, notifier, renderer)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionClientBuilder {
    /// Validates the session ID configuration.
    fn validate_session_id(&self) -> Result<SessionId> {
        let raw = self.session_id.as_deref().ok_or_else(|| {
            Error::config(
                "Session ID is required. Use .session_id() to set it.\n\
                 Example: SessionClient::builder().session_id(\"4c1f0e7a\")",
            )
        })?;

        SessionId::new(raw)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::MemoryTransport;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = SessionClientBuilder::new();
        assert!(builder.session_id.is_none());
        assert!(builder.transport.is_none());
        assert_eq!(builder.options, ClientOptions::new());
    }

    #[test]
    fn test_build_fails_without_session_id() {
        let err = SessionClientBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("Session ID"));
    }

    #[test]
    fn test_build_fails_with_blank_session_id() {
        let result = SessionClientBuilder::new().session_id("   ").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_fails_with_bad_host() {
        let result = SessionClientBuilder::new()
            .session_id("s1")
            .options(ClientOptions::new().with_host("a.com/x"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_derives_endpoint() {
        let client = SessionClientBuilder::new()
            .session_id("s1")
            .options(ClientOptions::new().with_host("example.com").with_secure())
            .transport(MemoryTransport::new())
            .build()
            .expect("client");

        assert_eq!(client.endpoint().as_str(), "wss://example.com/ws/session/s1/");
        assert_eq!(client.session_id().as_str(), "s1");
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = SessionClientBuilder::new().session_id("s1");
        let cloned = builder.clone();
        assert_eq!(builder.session_id, cloned.session_id);
    }
}
