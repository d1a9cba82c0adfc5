//! Message Dispatcher.
//!
//! Parses inbound envelopes and routes each to exactly one handler selected
//! by an exhaustive match over [`InboundMessage`]. Handlers update the
//! session state, run the stats aggregator where counters changed, and
//! publish typed events on the bus.
//!
//! Malformed input is dropped without touching state and never affects the
//! connection. Unparsable JSON and bodies of the wrong shape are also
//! notified; an envelope without a usable `action` is only logged.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::protocol::inbound::{
    ActionKind, DataLayerMessage, Envelope, ErrorMessage, InboundMessage, ReportMessage,
    ScreenshotMessage, SessionMessage, StatusMessage, UrlChangedMessage, ValidationMessage,
};
use crate::surface::{Notification, Notifier, Renderer, Severity};

use super::bus::EventBus;
use super::event::{ReportStatus, SessionEvent, Validity};
use super::state::{RemoteSessionStatus, StateHandle};
use super::stats::ValidationStats;

// ============================================================================
// Constants
// ============================================================================

/// Fallback text for `error` messages without one.
const UNKNOWN_SERVER_ERROR: &str = "Unknown server error.";

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes inbound envelopes to their handlers.
#[derive(Clone)]
pub struct Dispatcher {
    state: StateHandle,
    bus: EventBus,
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn Renderer>,
}

impl Dispatcher {
    /// Creates a dispatcher writing to `state` and publishing on `bus`.
    #[must_use]
    pub fn new(
        state: StateHandle,
        bus: EventBus,
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            state,
            bus,
            notifier,
            renderer,
        }
    }

    /// Dispatches one raw envelope received now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] for unparsable input. The error is
    /// already logged and the state is untouched; callers may ignore it.
    pub fn dispatch(&self, text: &str) -> Result<ActionKind> {
        self.dispatch_at(text, Utc::now())
    }

    /// Dispatches one raw envelope received at `received_at`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub fn dispatch_at(&self, text: &str, received_at: DateTime<Utc>) -> Result<ActionKind> {
        let body: Value = match serde_json::from_str(text) {
            Ok(body) => body,
            Err(e) => {
                return Err(self.reject(Error::protocol_violation(format!("invalid JSON: {e}"))));
            }
        };

        // No usable action: log only.
        let envelope = Envelope::from_value(body).inspect_err(|e| {
            error!(error = %e, "Discarding inbound message");
        })?;

        let action = envelope.action.clone();
        debug!(%action, "Inbound message");

        match envelope.into_message() {
            Ok(message) => {
                self.route(message, received_at);
                Ok(action)
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    fn reject(&self, error: Error) -> Error {
        error!(error = %error, "Discarding inbound message");
        self.notifier.notify(Notification::new(
            "Failed to process server message.",
            Severity::Danger,
        ));
        error
    }

    /// Routes a decoded message to its handler.
    pub fn route(&self, message: InboundMessage, received_at: DateTime<Utc>) {
        match message {
            InboundMessage::Screenshot(m) => self.on_screenshot(m, received_at),
            InboundMessage::DataLayer(m) => self.on_datalayer(m, received_at),
            InboundMessage::UrlChanged(m) => self.on_url_changed(m),
            InboundMessage::Status(m) => self.on_status(m),
            InboundMessage::Validation(m) => self.on_validation(m),
            InboundMessage::Session(m) => self.on_session(m),
            InboundMessage::Report(m) => self.on_report(m),
            InboundMessage::Error(m) => self.on_error(m),
            InboundMessage::Unknown { action, envelope } => {
                let err = Error::unknown_action(&action);
                warn!(error = %err, "Ignoring inbound message");
                self.bus
                    .notify(&SessionEvent::Unrecognized { action, envelope });
            }
        }
    }

    /// The event bus this dispatcher publishes on.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

// ============================================================================
// Handlers
// ============================================================================

impl Dispatcher {
    fn on_screenshot(&self, message: ScreenshotMessage, received_at: DateTime<Utc>) {
        let Some(image_url) = message.image_url.filter(|u| !u.is_empty()) else {
            warn!("Screenshot message without image_url");
            return;
        };

        let image_url = cache_busted(&image_url, received_at);
        let count = self.state.update(|s| {
            s.screenshot_count = s.screenshot_count.saturating_add(1);
            s.last_screenshot_url = Some(image_url.clone());
            s.screenshot_count
        });

        self.renderer.set_loading(false);
        self.bus
            .notify(&SessionEvent::Screenshot { image_url, count });
    }

    fn on_datalayer(&self, message: DataLayerMessage, received_at: DateTime<Utc>) {
        let event = message.into_event(received_at);

        let stats = self.state.update(|s| {
            s.datalayer_count = s.datalayer_count.saturating_add(1);
            match event.validity {
                Validity::Valid => s.valid_count = s.valid_count.saturating_add(1),
                Validity::Invalid => s.invalid_count = s.invalid_count.saturating_add(1),
                Validity::Unknown => {}
            }

            let stats = s.stats();
            s.validation_message = Some(stats.message.clone());
            stats
        });

        debug!(event = %event.event_name, validity = ?event.validity, "DataLayer event");

        self.publish_stats(stats);
        self.renderer.render_datalayer(&event);
        self.bus.notify(&SessionEvent::DataLayer(event));
    }

    fn on_url_changed(&self, message: UrlChangedMessage) {
        let Some(url) = message.url.filter(|u| !u.is_empty()) else {
            debug!("url_changed without url");
            return;
        };

        self.state.update(|s| s.current_url = Some(url.clone()));
        self.bus.notify(&SessionEvent::UrlChanged { url });
    }

    fn on_status(&self, message: StatusMessage) {
        let url = message.effective_url().map(str::to_owned);
        let remote_status = message
            .session_status
            .as_deref()
            .and_then(parse_remote_status);
        let counts_present = message.valid_count.is_some() || message.invalid_count.is_some();

        let (snapshot, stats) = self.state.update(|s| {
            if let Some(n) = message.screenshot_count {
                s.screenshot_count = n;
            }
            if let Some(n) = message.datalayer_count {
                s.datalayer_count = n;
            }
            if let Some(n) = message.valid_count {
                s.valid_count = n;
            }
            if let Some(n) = message.invalid_count {
                s.invalid_count = n;
            }
            if let Some(url) = &url {
                s.current_url = Some(url.clone());
            }
            if let Some(status) = remote_status {
                s.remote_session_status = status;
            }

            let stats = counts_present.then(|| {
                let stats = s.stats();
                s.validation_message = Some(stats.message.clone());
                stats
            });

            (s.clone(), stats)
        });

        if !snapshot.counters_consistent() {
            debug!(
                datalayer = snapshot.datalayer_count,
                valid = snapshot.valid_count,
                invalid = snapshot.invalid_count,
                "Server counters exceed datalayer count"
            );
        }

        if let Some(url) = url {
            self.bus.notify(&SessionEvent::UrlChanged { url });
        }
        if let Some(stats) = stats {
            self.publish_stats(stats);
        }
        self.bus.notify(&SessionEvent::Status(Box::new(snapshot)));
    }

    fn on_validation(&self, message: ValidationMessage) {
        let counts_present = message.valid_count.is_some() || message.invalid_count.is_some();

        let (text, stats) = self.state.update(|s| {
            let stats = counts_present.then(|| {
                if let Some(n) = message.valid_count {
                    s.valid_count = n;
                }
                if let Some(n) = message.invalid_count {
                    s.invalid_count = n;
                }
                s.stats()
            });

            // Server text wins over the computed summary.
            let text = message
                .message
                .clone()
                .filter(|m| !m.is_empty())
                .or_else(|| stats.as_ref().map(|st| st.message.clone()));

            if let Some(text) = &text {
                s.validation_message = Some(text.clone());
            }

            (text, stats)
        });

        if let Some(stats) = stats {
            self.publish_stats(stats);
        }
        self.bus
            .notify(&SessionEvent::Validation { message: text });
    }

    fn on_session(&self, message: SessionMessage) {
        let Some(status) = message.status.as_deref().and_then(parse_remote_status) else {
            debug!(status = ?message.status, "Session message without known status");
            return;
        };

        let completed = status == RemoteSessionStatus::Completed;
        self.state.update(|s| {
            s.remote_session_status = status;
            if completed {
                s.interaction_disabled = true;
            }
        });

        if completed {
            let text = message
                .message
                .clone()
                .unwrap_or_else(|| "Session finished.".to_string());
            self.notifier
                .notify(Notification::new(text, Severity::Info));
            self.renderer.disable_interaction();
        }

        self.bus.notify(&SessionEvent::Session {
            status,
            message: message.message,
        });
    }

    fn on_report(&self, message: ReportMessage) {
        let status = ReportStatus::from_wire(message.status.as_deref().unwrap_or_default());

        match status {
            ReportStatus::Generated => {
                let Some(report_url) = message.report_url.filter(|u| !u.is_empty()) else {
                    warn!("Report generated without report_url");
                    return;
                };

                self.state.update(|s| s.report_url = Some(report_url.clone()));
                let text = message
                    .message
                    .clone()
                    .unwrap_or_else(|| "Report generated.".to_string());
                self.notifier
                    .notify(Notification::new(text, Severity::Success));

                self.bus.notify(&SessionEvent::Report {
                    status: ReportStatus::Generated,
                    report_url: Some(report_url),
                    message: message.message,
                });
            }

            ReportStatus::Error => self.on_error(ErrorMessage {
                message: message.message,
            }),

            ReportStatus::Other(raw) => {
                debug!(status = %raw, "Report message with unhandled status");
                self.bus.notify(&SessionEvent::Report {
                    status: ReportStatus::Other(raw),
                    report_url: message.report_url,
                    message: message.message,
                });
            }
        }
    }

    fn on_error(&self, message: ErrorMessage) {
        let text = message
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UNKNOWN_SERVER_ERROR.to_string());

        let err = Error::remote(&text);
        error!(error = %err, "Server reported an error");

        self.notifier
            .notify(Notification::new(format!("Error: {text}"), Severity::Danger));
        self.renderer.set_loading(false);
        self.bus.notify(&SessionEvent::Error { message: text });
    }

    fn publish_stats(&self, stats: ValidationStats) {
        self.renderer.render_stats(&stats);
        self.bus.notify(&SessionEvent::Stats(stats));
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Appends a `t=<millis>` query parameter so viewers refetch the image.
fn cache_busted(url: &str, at: DateTime<Utc>) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}t={}", at.timestamp_millis())
}

fn parse_remote_status(raw: &str) -> Option<RemoteSessionStatus> {
    let status = RemoteSessionStatus::from_wire(raw);
    if status.is_none() {
        warn!(status = raw, "Unknown remote session status");
    }
    status
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use proptest::prelude::*;

    use crate::identifiers::SessionId;
    use crate::session::{ConnectionStatus, EventKind, SessionState};
    use crate::testing::{RecordingNotifier, RecordingRenderer, collect};

    struct Fixture {
        dispatcher: Dispatcher,
        state: StateHandle,
        bus: EventBus,
        notifier: Arc<RecordingNotifier>,
        renderer: Arc<RecordingRenderer>,
    }

    fn fixture() -> Fixture {
        let state = StateHandle::new(SessionState::new(
            SessionId::new("session-1").expect("valid id"),
        ));
        let bus = EventBus::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let renderer = Arc::new(RecordingRenderer::default());
        let dispatcher = Dispatcher::new(
            state.clone(),
            bus.clone(),
            notifier.clone(),
            renderer.clone(),
        );

        Fixture {
            dispatcher,
            state,
            bus,
            notifier,
            renderer,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_missing_action_leaves_state_unchanged() {
        let f = fixture();
        let before = f.state.snapshot();

        assert!(f.dispatcher.dispatch(r#"{"valid_count": 9}"#).is_err());
        assert!(f.dispatcher.dispatch("not json").is_err());
        assert!(f.dispatcher.dispatch(r#"{"action": 3}"#).is_err());

        let after = f.state.snapshot();
        assert_eq!(before, after);
        assert_eq!(after.connection_status, ConnectionStatus::Idle);
    }

    #[test]
    fn test_only_unparsable_json_is_notified() {
        let f = fixture();

        assert!(f.dispatcher.dispatch(r#"{"valid_count": 9}"#).is_err());
        assert!(f.dispatcher.dispatch(r#"{"action": null}"#).is_err());
        assert!(f.dispatcher.dispatch("[1, 2]").is_err());
        assert_eq!(f.notifier.count(Severity::Danger), 0);

        assert!(f.dispatcher.dispatch("{truncated").is_err());
        assert_eq!(f.notifier.count(Severity::Danger), 1);
        assert!(f.notifier.contains("Failed to process server message."));
    }

    #[test]
    fn test_datalayer_loose_fields_are_still_counted() {
        let f = fixture();
        let seen = collect(&f.bus, EventKind::DataLayer);

        for frame in [
            r#"{"action": "datalayer", "valid": true, "timestamp": 1714557600000}"#,
            r#"{"action": "datalayer", "valid": false, "id": 42}"#,
            r#"{"action": "datalayer", "valid": true, "errors": "bad"}"#,
        ] {
            f.dispatcher.dispatch_at(frame, at()).expect("dispatch");
        }

        let state = f.state.snapshot();
        assert_eq!(state.datalayer_count, 3);
        assert_eq!(state.valid_count, 2);
        assert_eq!(state.invalid_count, 1);
        assert_eq!(f.notifier.count(Severity::Danger), 0);

        let seen = seen.lock();
        let events: Vec<_> = seen
            .iter()
            .filter_map(|event| match event {
                SessionEvent::DataLayer(event) => Some(event),
                _ => None,
            })
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[0].timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(events[1].id.as_deref(), Some("42"));
        assert_eq!(events[2].errors, vec!["bad".to_string()]);
    }

    #[test]
    fn test_unknown_action_is_republished_raw() {
        let f = fixture();
        let seen = collect(&f.bus, EventKind::other("heartbeat"));

        let action = f
            .dispatcher
            .dispatch(r#"{"action": "heartbeat", "seq": 4}"#)
            .expect("non-fatal");

        assert_eq!(action, ActionKind::Unknown("heartbeat".to_string()));
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        let SessionEvent::Unrecognized { envelope, .. } = &seen[0] else {
            panic!("expected raw event");
        };
        assert_eq!(envelope["seq"], 4);
    }

    #[test]
    fn test_screenshot_increments_and_busts_cache() {
        let f = fixture();
        let seen = collect(&f.bus, EventKind::Screenshot);

        f.dispatcher
            .dispatch_at(r#"{"action": "screenshot", "image_url": "/media/s/1.jpg"}"#, at())
            .expect("dispatch");
        f.dispatcher
            .dispatch_at(r#"{"action": "screenshot", "image_url": "/media/s/2.jpg?v=1"}"#, at())
            .expect("dispatch");

        let state = f.state.snapshot();
        assert_eq!(state.screenshot_count, 2);
        let millis = at().timestamp_millis();
        assert_eq!(
            state.last_screenshot_url,
            Some(format!("/media/s/2.jpg?v=1&t={millis}"))
        );

        let seen = seen.lock();
        assert_eq!(
            seen[0],
            SessionEvent::Screenshot {
                image_url: format!("/media/s/1.jpg?t={millis}"),
                count: 1
            }
        );
        assert_eq!(f.renderer.last_loading(), Some(false));
    }

    #[test]
    fn test_screenshot_without_url_is_ignored() {
        let f = fixture();
        f.dispatcher
            .dispatch(r#"{"action": "screenshot"}"#)
            .expect("dispatch");
        assert_eq!(f.state.snapshot().screenshot_count, 0);
    }

    #[test]
    fn test_datalayer_tristate_counting() {
        let f = fixture();
        let seen = collect(&f.bus, EventKind::DataLayer);

        for valid in ["true", "false", "null"] {
            let text = format!(r#"{{"action": "datalayer", "event": "view", "valid": {valid}}}"#);
            f.dispatcher.dispatch(&text).expect("dispatch");
        }
        f.dispatcher
            .dispatch(r#"{"action": "datalayer"}"#)
            .expect("dispatch");

        let state = f.state.snapshot();
        assert_eq!(state.datalayer_count, 4);
        assert_eq!(state.valid_count, 1);
        assert_eq!(state.invalid_count, 1);
        assert_eq!(
            state.validation_message.as_deref(),
            Some("Validation: 50% passed (1/2).")
        );

        assert_eq!(seen.lock().len(), 4);
        assert_eq!(f.renderer.datalayers.lock().len(), 4);
        assert_eq!(f.renderer.stats.lock().len(), 4);
    }

    #[test]
    fn test_datalayer_event_defaults_to_receipt_time() {
        let f = fixture();
        f.dispatcher
            .dispatch_at(r#"{"action": "datalayer", "valid": true}"#, at())
            .expect("dispatch");

        let rendered = f.renderer.datalayers.lock();
        assert_eq!(rendered[0].timestamp, at());
        assert_eq!(rendered[0].event_name, "dataLayer Push");
    }

    #[test]
    fn test_url_changed() {
        let f = fixture();
        f.dispatcher
            .dispatch(r#"{"action": "url_changed", "url": "https://shop.test/cart"}"#)
            .expect("dispatch");
        assert_eq!(
            f.state.snapshot().current_url.as_deref(),
            Some("https://shop.test/cart")
        );
    }

    #[test]
    fn test_status_overwrites_present_counters_only() {
        let f = fixture();
        f.state.update(|s| {
            s.screenshot_count = 4;
            s.datalayer_count = 10;
        });

        f.dispatcher
            .dispatch(r#"{"action": "status", "valid_count": 7, "invalid_count": 3, "session_status": "active"}"#)
            .expect("dispatch");

        let state = f.state.snapshot();
        assert_eq!(state.screenshot_count, 4);
        assert_eq!(state.datalayer_count, 10);
        assert_eq!(state.valid_count, 7);
        assert_eq!(state.invalid_count, 3);
        assert_eq!(state.remote_session_status, RemoteSessionStatus::Active);

        let stats = state.stats();
        assert_eq!((stats.valid_percent, stats.invalid_percent), (70, 30));
    }

    #[test]
    fn test_status_one_to_two_uses_subtraction() {
        let f = fixture();
        let seen = collect(&f.bus, EventKind::Stats);

        f.dispatcher
            .dispatch(r#"{"action": "status", "valid_count": 1, "invalid_count": 2}"#)
            .expect("dispatch");

        let seen = seen.lock();
        let SessionEvent::Stats(stats) = &seen[0] else {
            panic!("expected stats");
        };
        assert_eq!(stats.valid_percent, 33);
        assert_eq!(stats.invalid_percent, 67);
    }

    #[test]
    fn test_status_overwrites_prior_increments() {
        let f = fixture();
        f.dispatcher
            .dispatch(r#"{"action": "datalayer", "valid": true}"#)
            .expect("dispatch");
        f.dispatcher
            .dispatch(r#"{"action": "status", "valid_count": 5, "invalid_count": 5}"#)
            .expect("dispatch");

        let state = f.state.snapshot();
        assert_eq!((state.valid_count, state.invalid_count), (5, 5));
        assert_eq!(state.datalayer_count, 1);
        assert_eq!(state.stats().valid_percent, 50);
    }

    #[test]
    fn test_status_reads_current_url_alias() {
        let f = fixture();
        let urls = collect(&f.bus, EventKind::UrlChanged);

        f.dispatcher
            .dispatch(r#"{"action": "status", "current_url": "https://a.test"}"#)
            .expect("dispatch");

        assert_eq!(f.state.snapshot().current_url.as_deref(), Some("https://a.test"));
        assert_eq!(urls.lock().len(), 1);
    }

    #[test]
    fn test_malformed_status_is_discarded() {
        let f = fixture();
        let before = f.state.snapshot();

        let err = f
            .dispatcher
            .dispatch(r#"{"action": "status", "valid_count": -1}"#)
            .unwrap_err();

        assert!(matches!(err, Error::ProtocolViolation { .. }));
        assert_eq!(f.state.snapshot(), before);
        assert_eq!(f.notifier.count(Severity::Danger), 1);
    }

    #[test]
    fn test_validation_server_message_wins() {
        let f = fixture();
        f.dispatcher
            .dispatch(r#"{"action": "validation", "valid_count": 2, "invalid_count": 2, "message": "Current stats: 2 valid"}"#)
            .expect("dispatch");

        let state = f.state.snapshot();
        assert_eq!((state.valid_count, state.invalid_count), (2, 2));
        assert_eq!(state.validation_message.as_deref(), Some("Current stats: 2 valid"));
        assert_eq!(f.renderer.stats.lock().len(), 1);
    }

    #[test]
    fn test_validation_message_only() {
        let f = fixture();
        f.dispatcher
            .dispatch(r#"{"action": "validation", "message": "Checking"}"#)
            .expect("dispatch");

        assert_eq!(f.state.snapshot().validation_message.as_deref(), Some("Checking"));
        assert!(f.renderer.stats.lock().is_empty());
    }

    #[test]
    fn test_session_completed_disables_interaction() {
        let f = fixture();
        f.dispatcher
            .dispatch(r#"{"action": "session", "status": "completed", "message": "Session stopped."}"#)
            .expect("dispatch");

        let state = f.state.snapshot();
        assert!(state.interaction_disabled);
        assert_eq!(state.remote_session_status, RemoteSessionStatus::Completed);
        assert_eq!(f.renderer.disabled_calls(), 1);
        assert!(f.notifier.contains("Session stopped."));
    }

    #[test]
    fn test_session_active_keeps_interaction() {
        let f = fixture();
        f.dispatcher
            .dispatch(r#"{"action": "session", "status": "active"}"#)
            .expect("dispatch");

        let state = f.state.snapshot();
        assert!(!state.interaction_disabled);
        assert_eq!(state.remote_session_status, RemoteSessionStatus::Active);
    }

    #[test]
    fn test_report_generated() {
        let f = fixture();
        let seen = collect(&f.bus, EventKind::Report);

        f.dispatcher
            .dispatch(r#"{"action": "report", "status": "generated", "report_url": "/reports/9/", "report_id": "9"}"#)
            .expect("dispatch");

        assert_eq!(f.state.snapshot().report_url.as_deref(), Some("/reports/9/"));
        assert_eq!(f.notifier.count(Severity::Success), 1);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_report_error_routes_to_error_path() {
        let f = fixture();
        let errors = collect(&f.bus, EventKind::Error);

        f.dispatcher
            .dispatch(r#"{"action": "report", "status": "error", "message": "disk full"}"#)
            .expect("dispatch");

        assert_eq!(
            *errors.lock(),
            vec![SessionEvent::Error {
                message: "disk full".to_string()
            }]
        );
        assert!(f.notifier.contains("Error: disk full"));
    }

    #[test]
    fn test_error_message_default_text() {
        let f = fixture();
        f.dispatcher
            .dispatch(r#"{"action": "error"}"#)
            .expect("dispatch");

        assert!(f.notifier.contains(UNKNOWN_SERVER_ERROR));
        assert_eq!(f.renderer.last_loading(), Some(false));
        assert_eq!(f.state.snapshot().connection_status, ConnectionStatus::Idle);
    }

    #[test]
    fn test_cache_busted_separator() {
        assert_eq!(cache_busted("/a.jpg", at()), format!("/a.jpg?t={}", at().timestamp_millis()));
        assert!(cache_busted("/a.jpg?x=1", at()).contains("?x=1&t="));
    }

    proptest! {
        #[test]
        fn prop_datalayer_counters_stay_consistent(validity in proptest::collection::vec(proptest::option::of(any::<bool>()), 0..64)) {
            let f = fixture();

            for (i, valid) in validity.iter().enumerate() {
                let valid = match valid {
                    Some(true) => "true",
                    Some(false) => "false",
                    None => "null",
                };
                let before = f.state.snapshot();
                let text = format!(r#"{{"action": "datalayer", "valid": {valid}}}"#);
                f.dispatcher.dispatch(&text).expect("dispatch");
                let after = f.state.snapshot();

                prop_assert!(after.counters_consistent());
                prop_assert_eq!(after.datalayer_count, i as u64 + 1);

                let bumped = (after.valid_count - before.valid_count) + (after.invalid_count - before.invalid_count);
                prop_assert_eq!(bumped, u64::from(valid != "null"));
            }
        }
    }
}
