//! Test doubles shared by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::session::{DataLayerEvent, EventBus, EventKind, SessionEvent, ValidationStats};
use crate::surface::{Notification, Notifier, Renderer, Severity};

/// Records every notification.
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(crate) fn count(&self, severity: Severity) -> usize {
        self.seen
            .lock()
            .iter()
            .filter(|n| n.severity == severity)
            .count()
    }

    pub(crate) fn messages(&self) -> Vec<String> {
        self.seen.lock().iter().map(|n| n.message.clone()).collect()
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.seen.lock().iter().any(|n| n.message.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().push(notification);
    }
}

/// Records renderer calls.
#[derive(Debug, Default)]
pub(crate) struct RecordingRenderer {
    pub(crate) datalayers: Mutex<Vec<DataLayerEvent>>,
    pub(crate) stats: Mutex<Vec<ValidationStats>>,
    pub(crate) loading: Mutex<Vec<bool>>,
    pub(crate) disabled: AtomicUsize,
}

impl RecordingRenderer {
    pub(crate) fn disabled_calls(&self) -> usize {
        self.disabled.load(Ordering::SeqCst)
    }

    pub(crate) fn last_loading(&self) -> Option<bool> {
        self.loading.lock().last().copied()
    }
}

impl Renderer for RecordingRenderer {
    fn render_datalayer(&self, event: &DataLayerEvent) {
        self.datalayers.lock().push(event.clone());
    }

    fn render_stats(&self, stats: &ValidationStats) {
        self.stats.lock().push(stats.clone());
    }

    fn set_loading(&self, visible: bool) {
        self.loading.lock().push(visible);
    }

    fn disable_interaction(&self) {
        self.disabled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Collects every event of `kind` published on `bus`.
pub(crate) fn collect(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<SessionEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(kind, move |event| sink.lock().push(event.clone()));
    seen
}
