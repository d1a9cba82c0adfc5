//! In-process transport.
//!
//! [`MemoryTransport`] opens links that go nowhere. Whoever holds the
//! transport plays the server: it reads what the client sent and injects
//! open, message and close events through [`MemoryLink`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio_tungstenite::tungstenite::Error as WsError;
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::LinkGeneration;

use super::{CloseInfo, EventSink, Link, Transport};

// ============================================================================
// MemoryTransport
// ============================================================================

#[derive(Debug, Default)]
struct Inner {
    links: Vec<MemoryLink>,
    fail_next: u32,
}

/// Transport whose links are driven by the caller.
///
/// Cloning shares the same set of links.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTransport {
    /// Creates a transport with no links.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls to [`Transport::open`] fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.inner.lock().fail_next = count;
    }

    /// Number of links opened so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner.lock().links.len()
    }

    /// Most recently opened link.
    #[must_use]
    pub fn last_link(&self) -> Option<MemoryLink> {
        self.inner.lock().links.last().cloned()
    }

    /// Link opened `index`-th, starting at 0.
    #[must_use]
    pub fn link(&self, index: usize) -> Option<MemoryLink> {
        self.inner.lock().links.get(index).cloned()
    }
}

impl Transport for MemoryTransport {
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Link>> {
        let mut inner = self.inner.lock();

        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(Error::transport_creation("memory transport refused"));
        }

        let link = MemoryLink {
            state: Arc::new(LinkState {
                url: url.clone(),
                sink,
                sent: Mutex::new(Vec::new()),
                closed_with: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        };
        inner.links.push(link.clone());

        Ok(Box::new(link))
    }
}

// ============================================================================
// MemoryLink
// ============================================================================

#[derive(Debug)]
struct LinkState {
    url: Url,
    sink: EventSink,
    sent: Mutex<Vec<String>>,
    closed_with: Mutex<Option<(u16, String)>>,
    closed: AtomicBool,
}

/// Server side of one in-memory link.
#[derive(Debug, Clone)]
pub struct MemoryLink {
    state: Arc<LinkState>,
}

impl MemoryLink {
    /// URL the client asked for.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.state.url
    }

    /// Generation the client assigned to this link.
    #[must_use]
    pub fn generation(&self) -> LinkGeneration {
        self.state.sink.generation()
    }

    /// Frames the client sent, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.state.sent.lock().clone()
    }

    /// Frames the client sent, parsed as JSON.
    #[must_use]
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Code and reason of a client-initiated close.
    #[must_use]
    pub fn closed_with(&self) -> Option<(u16, String)> {
        self.state.closed_with.lock().clone()
    }

    /// Reports the link as open.
    pub fn open(&self) {
        self.state.sink.opened();
    }

    /// Delivers a text frame to the client.
    pub fn push(&self, text: impl Into<String>) {
        self.state.sink.message(text);
    }

    /// Delivers a JSON value as a text frame.
    pub fn push_json(&self, value: &serde_json::Value) {
        self.push(value.to_string());
    }

    /// Closes the link from the server side.
    pub fn close_with(&self, info: CloseInfo) {
        if !self.state.closed.swap(true, Ordering::SeqCst) {
            self.state.sink.closed(info);
        }
    }

    /// Drops the link without a closing handshake.
    pub fn drop_connection(&self) {
        self.state.sink.error("connection reset");
        self.close_with(CloseInfo::abnormal("connection reset"));
    }
}

impl Link for MemoryLink {
    fn send(&self, text: String) -> Result<()> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(Error::WebSocket(WsError::AlreadyClosed));
        }

        self.state.sent.lock().push(text);
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        *self.state.closed_with.lock() = Some((code, reason.to_string()));
        self.close_with(CloseInfo::clean(code, reason));
    }
}

// ============================================================================
// Tests
// ============================================================================
