//! Client connection options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use datalayer_session::{ClientOptions, SessionId};
//!
//! let options = ClientOptions::new()
//!     .with_host("tags.example.com")
//!     .with_secure()
//!     .with_reconnect_interval(Duration::from_secs(1));
//!
//! let id = SessionId::new("f3b1c2").unwrap();
//! let url = options.endpoint(&id).unwrap();
//! assert_eq!(url.as_str(), "wss://tags.example.com/ws/session/f3b1c2/");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::SessionId;

// ============================================================================
// Constants
// ============================================================================

/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "localhost:8000";

/// Fixed delay between reconnection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(3);

/// Reconnection attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

// ============================================================================
// ClientOptions
// ============================================================================

/// How and where the client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Host and optional port of the session server.
    pub host: String,

    /// Use `wss` instead of `ws`.
    pub secure: bool,

    /// Delay before each reconnection attempt.
    pub reconnect_interval: Duration,

    /// Attempts allowed after an unclean close.
    pub max_reconnect_attempts: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with the default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            secure: false,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the server host, e.g. `example.com` or `127.0.0.1:8000`.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Connects over `wss`.
    #[inline]
    #[must_use]
    pub fn with_secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Chooses the scheme the way a page would: secure pages use `wss`.
    #[inline]
    #[must_use]
    pub fn with_page_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the delay between reconnection attempts.
    #[inline]
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Sets the reconnection attempt cap.
    #[inline]
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl ClientOptions {
    /// Scheme for the configured security.
    #[inline]
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Builds `<ws|wss>://<host>/ws/session/<id>/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the host does not form a valid URL.
    pub fn endpoint(&self, session_id: &SessionId) -> Result<Url> {
        let id = urlencoding::encode(session_id.as_str());
        let url = Url::parse(&format!(
            "{}://{}/ws/session/{id}/",
            self.scheme(),
            self.host
        ))?;
        Ok(url)
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty host or a host carrying a path.
    pub fn validate(&self) -> Result<()> {
        let host = self.host.trim();

        if host.is_empty() {
            return Err(Error::config("host must not be empty"));
        }

        if host.contains(['/', '?', '#']) || host.contains("://") {
            return Err(Error::config(format!(
                "host must be a bare host[:port], got '{host}'"
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> SessionId {
        SessionId::new(raw).expect("valid id")
    }

    #[test]
    fn test_defaults() {
        let options = ClientOptions::new();
        assert_eq!(options.host, "localhost:8000");
        assert!(!options.secure);
        assert_eq!(options.reconnect_interval, Duration::from_secs(3));
        assert_eq!(options.max_reconnect_attempts, 5);
        assert_eq!(options, ClientOptions::default());
    }

    #[test]
    fn test_endpoint_insecure() {
        let url = ClientOptions::new().endpoint(&id("abc")).expect("url");
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/session/abc/");
    }

    #[test]
    fn test_endpoint_secure_page() {
        let url = ClientOptions::new()
            .with_host("example.com")
            .with_page_secure(true)
            .endpoint(&id("abc"))
            .expect("url");
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_endpoint_encodes_session_id() {
        let url = ClientOptions::new().endpoint(&id("a b/c")).expect("url");
        assert_eq!(url.path(), "/ws/session/a%20b%2Fc/");
    }

    #[test]
    fn test_validate() {
        assert!(ClientOptions::new().validate().is_ok());
        assert!(ClientOptions::new().with_host("").validate().is_err());
        assert!(ClientOptions::new().with_host("a.com/path").validate().is_err());
        assert!(ClientOptions::new().with_host("http://a.com").validate().is_err());
    }

    #[test]
    fn test_builder_methods() {
        let options = ClientOptions::new()
            .with_secure()
            .with_reconnect_interval(Duration::from_millis(10))
            .with_max_reconnect_attempts(2);
        assert_eq!(options.scheme(), "wss");
        assert_eq!(options.reconnect_interval, Duration::from_millis(10));
        assert_eq!(options.max_reconnect_attempts, 2);
    }
}
