//! Session client event loop.
//!
//! [`SessionClient`] owns the connection state machine. Transport events,
//! reconnection timers and commands from [`SessionHandle`]s all arrive over
//! channels and are handled one at a time, so the client is the only writer
//! of the session state.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{LinkGeneration, SessionId};
use crate::protocol::Command;
use crate::session::{
    ConnectionStatus, Dispatcher, EventBus, RemoteSessionStatus, SessionEvent, SessionState,
    StateHandle,
};
use crate::surface::{Notification, Notifier, Renderer, Severity};
use crate::transport::{
    CLOSE_GOING_AWAY, CLOSE_NORMAL, CloseInfo, EventSink, Link, LinkEvent, Transport,
    TransportEvent,
};

use super::builder::SessionClientBuilder;
use super::handle::SessionHandle;
use super::options::ClientOptions;

// ============================================================================
// Constants
// ============================================================================

/// Reason sent with the close frame on shutdown.
const SHUTDOWN_REASON: &str = "client shutdown";

// ============================================================================
// ClientEvent
// ============================================================================

/// Inputs of the event loop, besides transport events.
pub(crate) enum ClientEvent {
    /// Reconnection delay elapsed.
    ReconnectDue,
    /// Send a command and report the outcome.
    Command {
        command: Command,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Restart after a terminal state.
    Restart { reply: oneshot::Sender<Result<()>> },
    /// Close the link and stop the loop.
    Shutdown { reply: oneshot::Sender<()> },
}

/// One input, whichever channel it came from.
enum Input {
    Link(LinkEvent),
    Client(ClientEvent),
}

// ============================================================================
// SessionClient
// ============================================================================

/// Connection manager for one remote session.
///
/// Create one with [`SessionClient::builder`], then either drive it with
/// [`SessionClient::spawn`] or step it manually.
pub struct SessionClient {
    session_id: SessionId,
    options: ClientOptions,
    endpoint: Url,

    state: StateHandle,
    bus: EventBus,
    dispatcher: Dispatcher,

    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    renderer: Arc<dyn Renderer>,

    /// Current link, if any.
    link: Option<Box<dyn Link>>,
    /// Generation of `link`. Events of older generations are dropped.
    generation: LinkGeneration,

    link_tx: mpsc::UnboundedSender<LinkEvent>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    control_tx: mpsc::UnboundedSender<ClientEvent>,
    control_rx: mpsc::UnboundedReceiver<ClientEvent>,

    stopped: bool,
}

impl fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionClient")
            .field("session_id", &self.session_id)
            .field("endpoint", &self.endpoint.as_str())
            .field("status", &self.state.connection_status())
            .field("generation", &self.generation)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionClient {
    /// Returns a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::new()
    }

    pub(crate) fn new(
        session_id: SessionId,
        options: ClientOptions,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self> {
        options.validate()?;
        let endpoint = options.endpoint(&session_id)?;

        let state = StateHandle::new(SessionState::new(session_id.clone()));
        let bus = EventBus::new();
        let dispatcher = Dispatcher::new(
            state.clone(),
            bus.clone(),
            Arc::clone(&notifier),
            Arc::clone(&renderer),
        );

        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        debug!(%session_id, %endpoint, "Session client created");

        Ok(Self {
            session_id,
            options,
            endpoint,
            state,
            bus,
            dispatcher,
            transport,
            notifier,
            renderer,
            link: None,
            generation: LinkGeneration::default(),
            link_tx,
            link_rx,
            control_tx,
            control_rx,
            stopped: false,
        })
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl SessionClient {
    /// Session this client mirrors.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Endpoint the client connects to.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Read access to the session state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// Event bus carrying every session event.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns `true` once [`SessionClient::shutdown`] ran.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Creates a handle that sends commands to this client.
    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(
            self.control_tx.clone(),
            self.state.clone(),
            self.bus.clone(),
            Arc::clone(&self.notifier),
        )
    }
}

// ============================================================================
// Event Loop
// ============================================================================

impl SessionClient {
    /// Spawns the event loop on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// Connects and processes inputs until shutdown.
    pub async fn run(mut self) {
        if self.state.connection_status() == ConnectionStatus::Idle {
            self.connect();
        }

        while !self.stopped {
            if !self.step().await {
                break;
            }
        }

        debug!(session_id = %self.session_id, "Session client stopped");
    }

    /// Waits for one input and handles it.
    ///
    /// Returns `false` once the client stopped.
    pub async fn step(&mut self) -> bool {
        if self.stopped {
            return false;
        }

        let input = tokio::select! {
            Some(event) = self.link_rx.recv() => Input::Link(event),
            Some(event) = self.control_rx.recv() => Input::Client(event),
            else => return false,
        };

        match input {
            Input::Link(event) => self.handle_link_event(event),
            Input::Client(event) => self.handle_client_event(event),
        }

        !self.stopped
    }

    fn handle_client_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::ReconnectDue => self.on_reconnect_due(),

            ClientEvent::Command { command, reply } => {
                let _ = reply.send(self.send_command(&command));
            }

            ClientEvent::Restart { reply } => {
                let _ = reply.send(self.restart());
            }

            ClientEvent::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
            }
        }
    }

    fn handle_link_event(&mut self, event: LinkEvent) {
        if event.generation != self.generation {
            trace!(
                generation = %event.generation,
                current = %self.generation,
                "Ignoring event from superseded link"
            );
            return;
        }

        match event.event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Message(text) => {
                // Failures are logged and notified by the dispatcher.
                let _ = self.dispatcher.dispatch(&text);
            }
            TransportEvent::Closed(info) => self.on_closed(info),
            TransportEvent::Error(message) => self.on_transport_error(&message),
        }
    }
}

// ============================================================================
// Connection Lifecycle
// ============================================================================

impl SessionClient {
    /// Opens a link unless one is already connecting or open.
    pub fn connect(&mut self) {
        let status = self.state.connection_status();

        if status.is_live() {
            debug!(session_id = %self.session_id, %status, "Connect ignored, link already live");
            return;
        }

        if self
            .state
            .update(|s| s.transition(ConnectionStatus::Connecting))
            .is_err()
        {
            return;
        }

        self.renderer.set_loading(true);
        self.link = None;
        self.generation = self.generation.next();

        let sink = EventSink::new(self.generation, self.link_tx.clone());
        debug!(
            session_id = %self.session_id,
            generation = %self.generation,
            endpoint = %self.endpoint,
            "Connecting"
        );

        match self.transport.open(&self.endpoint, sink) {
            Ok(link) => self.link = Some(link),
            Err(e) => {
                error!(session_id = %self.session_id, error = %e, "Failed to create transport");
                self.notifier.notify(Notification::new(
                    "Failed to connect to the session.",
                    Severity::Danger,
                ));
                self.on_closed(CloseInfo::abnormal(e.to_string()));
            }
        }
    }

    /// Leaves a terminal state and connects again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] while a link is live or a
    /// reconnection is pending.
    pub fn restart(&mut self) -> Result<()> {
        let status = self.state.connection_status();

        match status {
            ConnectionStatus::Failed => {
                self.state
                    .update(|s| s.transition(ConnectionStatus::Idle))?;
            }
            ConnectionStatus::ClosedClean | ConnectionStatus::Idle => {}
            other => return Err(Error::invalid_transition(other, ConnectionStatus::Connecting)),
        }

        self.state.update(|s| {
            s.reconnect_attempts = 0;
            if s.remote_session_status != RemoteSessionStatus::Completed {
                s.interaction_disabled = false;
            }
        });

        info!(session_id = %self.session_id, from = %status, "Restarting session client");
        self.connect();
        Ok(())
    }

    /// Closes the link with code 1000 and stops the loop.
    ///
    /// A live or reconnecting client ends in `ClosedClean`. `Idle` and
    /// `Failed` are kept: there is no link and nothing left to announce.
    pub fn shutdown(&mut self) {
        if let Some(link) = self.link.take() {
            link.close(CLOSE_NORMAL, SHUTDOWN_REASON);
        }

        // Close events of the old link are no longer ours.
        self.generation = self.generation.next();
        self.stopped = true;

        let closed = self
            .state
            .update(|s| s.transition(ConnectionStatus::ClosedClean).is_ok());
        if closed {
            self.bus.notify(&SessionEvent::Connection {
                connected: false,
                code: Some(CLOSE_NORMAL),
            });
        }

        self.renderer.set_loading(false);
        info!(session_id = %self.session_id, "Session client shut down");
    }

    fn on_opened(&mut self) {
        let opened = self.state.update(|s| {
            s.transition(ConnectionStatus::Open)?;
            s.reconnect_attempts = 0;
            Ok::<_, Error>(())
        });
        if opened.is_err() {
            return;
        }

        info!(session_id = %self.session_id, generation = %self.generation, "Connected");
        self.renderer.set_loading(false);

        if let Err(e) = self.transmit(&Command::init(self.session_id.clone())) {
            warn!(session_id = %self.session_id, error = %e, "Failed to send init");
        }

        self.bus.notify(&SessionEvent::Connection {
            connected: true,
            code: None,
        });
        self.notifier.notify(Notification::new(
            "Connected to the interactive session.",
            Severity::Success,
        ));
    }

    fn on_closed(&mut self, info: CloseInfo) {
        self.link = None;
        self.renderer.set_loading(false);

        let status = self.state.connection_status();
        if !status.is_live() {
            debug!(session_id = %self.session_id, %status, code = info.code, "Close ignored");
            return;
        }

        self.bus.notify(&SessionEvent::Connection {
            connected: false,
            code: Some(info.code),
        });

        if info.is_clean() {
            self.on_clean_close(&info);
        } else {
            warn!(
                session_id = %self.session_id,
                code = info.code,
                reason = %info.reason,
                "Connection lost"
            );
            self.schedule_reconnect();
        }
    }

    fn on_clean_close(&mut self, info: &CloseInfo) {
        info!(session_id = %self.session_id, code = info.code, "Connection closed");

        let normal = info.is_normal();
        let closed = self.state.update(|s| {
            s.transition(ConnectionStatus::ClosedClean)?;
            if normal {
                s.interaction_disabled = true;
            }
            Ok::<_, Error>(())
        });
        if closed.is_err() {
            return;
        }

        if normal {
            self.renderer.disable_interaction();
            self.notifier
                .notify(Notification::new("Session finished.", Severity::Info));
        } else if info.code != CLOSE_GOING_AWAY {
            self.notifier.notify(Notification::new(
                format!("Disconnected: {}", info.describe()),
                Severity::Warning,
            ));
        }
    }

    fn on_transport_error(&mut self, message: &str) {
        error!(session_id = %self.session_id, error = message, "Transport error");
        self.renderer.set_loading(false);
        self.notifier
            .notify(Notification::new("Connection error.", Severity::Danger));
    }

    fn schedule_reconnect(&mut self) {
        let max_attempts = self.options.max_reconnect_attempts;
        let attempts = self.state.read(|s| s.reconnect_attempts);

        if attempts >= max_attempts {
            self.give_up(attempts);
            return;
        }

        let attempt = attempts + 1;
        let scheduled = self.state.update(|s| {
            s.transition(ConnectionStatus::Reconnecting)?;
            s.reconnect_attempts = attempt;
            Ok::<_, Error>(())
        });
        if scheduled.is_err() {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            error!(session_id = %self.session_id, "No runtime for the reconnection timer");
            self.give_up(attempt);
            return;
        };

        info!(
            session_id = %self.session_id,
            attempt,
            max_attempts,
            delay = ?self.options.reconnect_interval,
            "Scheduling reconnection"
        );

        self.bus.notify(&SessionEvent::Reconnecting {
            attempt,
            max_attempts,
        });
        self.notifier.notify(Notification::new(
            format!("Connection lost. Reconnecting ({attempt}/{max_attempts})..."),
            Severity::Warning,
        ));

        let delay = self.options.reconnect_interval;
        let tx = self.control_tx.clone();
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ClientEvent::ReconnectDue);
        });
    }

    fn give_up(&mut self, attempts: u32) {
        if self
            .state
            .update(|s| s.transition(ConnectionStatus::Failed))
            .is_err()
        {
            return;
        }

        let err = Error::reconnect_exhausted(attempts);
        error!(session_id = %self.session_id, error = %err, "Giving up");

        self.bus
            .notify(&SessionEvent::ReconnectExhausted { attempts });
        self.notifier.notify(
            Notification::new(
                "Unable to reconnect. Please restart the session.",
                Severity::Danger,
            )
            .persistent(),
        );
    }

    fn on_reconnect_due(&mut self) {
        let status = self.state.connection_status();

        if status != ConnectionStatus::Reconnecting {
            debug!(session_id = %self.session_id, %status, "Reconnection no longer needed");
            return;
        }

        self.connect();
    }
}

// ============================================================================
// Commands
// ============================================================================

impl SessionClient {
    /// Sends `command` if the link is open and interaction is allowed.
    ///
    /// Refused commands are dropped, never queued, and the user is warned.
    ///
    /// # Errors
    ///
    /// - [`Error::InteractionDisabled`] once the session ended
    /// - [`Error::NotConnected`] unless the link is open
    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        let (status, disabled) = self
            .state
            .read(|s| (s.connection_status, s.interaction_disabled));

        if disabled && command.is_user_command() {
            warn!(session_id = %self.session_id, action = command.action(), "Interaction disabled");
            self.notifier.notify(Notification::new(
                "The session has ended. Interaction is disabled.",
                Severity::Warning,
            ));
            return Err(Error::InteractionDisabled);
        }

        if status != ConnectionStatus::Open {
            warn!(session_id = %self.session_id, %status, action = command.action(), "Dropping command");
            self.notifier.notify(Notification::new(
                "Not connected to the session. Please wait...",
                Severity::Warning,
            ));
            return Err(Error::not_connected(status));
        }

        self.transmit(command)?;

        if command.shows_loading() {
            self.renderer.set_loading(true);
        }
        Ok(())
    }

    fn transmit(&self, command: &Command) -> Result<()> {
        let Some(link) = &self.link else {
            return Err(Error::not_connected(self.state.connection_status()));
        };

        let text = command.encode()?;
        link.send(text)?;

        trace!(session_id = %self.session_id, action = command.action(), "Command sent");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;

    use crate::session::EventKind;
    use crate::testing::{RecordingNotifier, RecordingRenderer, collect};
    use crate::transport::{MemoryLink, MemoryTransport};

    struct Fixture {
        client: SessionClient,
        transport: MemoryTransport,
        notifier: Arc<RecordingNotifier>,
        renderer: Arc<RecordingRenderer>,
    }

    fn fixture_with(options: ClientOptions) -> Fixture {
        let transport = MemoryTransport::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let renderer = Arc::new(RecordingRenderer::default());

        let client = SessionClient::builder()
            .session_id("s1")
            .options(options)
            .transport(transport.clone())
            .notifier(notifier.clone())
            .renderer(renderer.clone())
            .build()
            .expect("client");

        Fixture {
            client,
            transport,
            notifier,
            renderer,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(ClientOptions::new())
    }

    fn link(f: &Fixture) -> MemoryLink {
        f.transport.last_link().expect("link opened")
    }

    fn status(f: &Fixture) -> ConnectionStatus {
        f.client.state().connection_status()
    }

    async fn open(f: &mut Fixture) {
        f.client.connect();
        link(f).open();
        assert!(f.client.step().await);
        assert_eq!(status(f), ConnectionStatus::Open);
    }

    /// Drops the current link and handles its error and close events.
    async fn drop_link(f: &mut Fixture) {
        link(f).drop_connection();
        f.client.step().await;
        f.client.step().await;
    }

    #[tokio::test]
    async fn test_connect_twice_creates_one_link() {
        let mut f = fixture();

        f.client.connect();
        f.client.connect();
        assert_eq!(f.transport.open_count(), 1);
        assert_eq!(status(&f), ConnectionStatus::Connecting);
        assert_eq!(f.renderer.last_loading(), Some(true));

        link(&f).open();
        f.client.step().await;
        f.client.connect();
        assert_eq!(f.transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_open_sends_init() {
        let mut f = fixture();
        let connections = collect(f.client.bus(), EventKind::Connection);

        open(&mut f).await;

        assert_eq!(link(&f).sent_json(), vec![json!({"action": "init", "sessionId": "s1"})]);
        assert_eq!(f.client.state().snapshot().reconnect_attempts, 0);
        assert_eq!(f.renderer.last_loading(), Some(false));
        assert!(f.notifier.contains("Connected to the interactive session."));
        assert_eq!(
            *connections.lock(),
            vec![SessionEvent::Connection {
                connected: true,
                code: None
            }]
        );
    }

    #[tokio::test]
    async fn test_commands_before_open_never_reach_transport() {
        let mut f = fixture();
        f.client.connect();

        let err = f.client.send_command(&Command::back()).unwrap_err();

        assert!(matches!(
            err,
            Error::NotConnected {
                status: ConnectionStatus::Connecting
            }
        ));
        assert!(link(&f).sent().is_empty());
        assert_eq!(f.notifier.count(Severity::Warning), 1);
    }

    #[tokio::test]
    async fn test_command_sent_when_open() {
        let mut f = fixture();
        open(&mut f).await;

        f.client
            .send_command(&Command::goto("example.com").expect("goto"))
            .expect("sent");
        f.client
            .send_command(&Command::check_validation())
            .expect("sent");

        let sent = link(&f).sent_json();
        assert_eq!(
            sent[1],
            json!({"action": "navigation", "command": "goto", "url": "https://example.com"})
        );
        assert_eq!(sent[2], json!({"action": "validation", "command": "check"}));
        assert_eq!(f.renderer.last_loading(), Some(true));
    }

    #[tokio::test]
    async fn test_datalayer_then_status_resync() {
        let mut f = fixture();
        open(&mut f).await;

        link(&f).push_json(&json!({"action": "datalayer", "event": "purchase", "valid": true}));
        f.client.step().await;

        let state = f.client.state().snapshot();
        assert_eq!((state.datalayer_count, state.valid_count), (1, 1));

        link(&f).push_json(&json!({"action": "status", "valid_count": 5, "invalid_count": 5}));
        f.client.step().await;

        let state = f.client.state().snapshot();
        assert_eq!((state.valid_count, state.invalid_count), (5, 5));
        assert_eq!(state.stats().valid_percent, 50);
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection() {
        let mut f = fixture();
        open(&mut f).await;

        link(&f).push("{\"valid_count\": 3}");
        f.client.step().await;

        assert_eq!(status(&f), ConnectionStatus::Open);
        assert_eq!(f.client.state().snapshot().valid_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclean_close_reconnects_after_interval() {
        let mut f = fixture();
        let reconnecting = collect(f.client.bus(), EventKind::Reconnecting);
        open(&mut f).await;

        drop_link(&mut f).await;
        assert_eq!(status(&f), ConnectionStatus::Reconnecting);
        assert_eq!(f.client.state().snapshot().reconnect_attempts, 1);

        let started = tokio::time::Instant::now();
        f.client.step().await;
        assert!(started.elapsed() >= Duration::from_secs(3));

        assert_eq!(status(&f), ConnectionStatus::Connecting);
        assert_eq!(f.transport.open_count(), 2);

        link(&f).open();
        f.client.step().await;
        assert_eq!(f.client.state().snapshot().reconnect_attempts, 0);
        assert_eq!(
            *reconnecting.lock(),
            vec![SessionEvent::Reconnecting {
                attempt: 1,
                max_attempts: 5
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_attempts_are_capped() {
        let mut f = fixture();
        let exhausted = collect(f.client.bus(), EventKind::ReconnectExhausted);
        open(&mut f).await;

        drop_link(&mut f).await;
        for _ in 0..5 {
            assert!(f.client.state().snapshot().reconnect_attempts <= 5);
            f.client.step().await; // timer
            drop_link(&mut f).await;
        }

        assert_eq!(status(&f), ConnectionStatus::Failed);
        assert_eq!(f.client.state().snapshot().reconnect_attempts, 5);
        assert_eq!(f.transport.open_count(), 6);
        assert_eq!(exhausted.lock().len(), 1);

        // Nothing is scheduled any more.
        f.client.connect();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(f.transport.open_count(), 6);
        assert_eq!(exhausted.lock().len(), 1);

        let persistent = f
            .notifier
            .seen
            .lock()
            .iter()
            .filter(|n| n.duration.is_some())
            .count();
        assert_eq!(persistent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_skips_when_already_reconnected() {
        let mut f = fixture();
        open(&mut f).await;
        drop_link(&mut f).await;

        f.client.connect();
        link(&f).open();
        f.client.step().await;
        assert_eq!(status(&f), ConnectionStatus::Open);

        f.client.step().await; // timer fires
        assert_eq!(f.transport.open_count(), 2);
        assert_eq!(status(&f), ConnectionStatus::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_creation_failure_takes_reconnect_path() {
        let mut f = fixture();
        f.transport.fail_next_opens(1);

        f.client.connect();
        assert_eq!(status(&f), ConnectionStatus::Reconnecting);
        assert_eq!(f.transport.open_count(), 0);
        assert!(f.notifier.contains("Failed to connect"));

        f.client.step().await;
        assert_eq!(f.transport.open_count(), 1);
        assert_eq!(status(&f), ConnectionStatus::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_link_is_ignored() {
        let mut f = fixture();
        open(&mut f).await;
        let old = link(&f);
        drop_link(&mut f).await;
        f.client.step().await; // timer, opens second link

        old.push_json(&json!({"action": "status", "valid_count": 9}));
        f.client.step().await;

        assert_eq!(f.client.state().snapshot().valid_count, 0);
        assert_eq!(status(&f), ConnectionStatus::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_normal_close_ends_session() {
        let mut f = fixture();
        open(&mut f).await;

        link(&f).close_with(CloseInfo::clean(CLOSE_NORMAL, ""));
        f.client.step().await;

        let state = f.client.state().snapshot();
        assert_eq!(state.connection_status, ConnectionStatus::ClosedClean);
        assert!(state.interaction_disabled);
        assert_eq!(f.renderer.disabled_calls(), 1);
        assert!(f.notifier.contains("Session finished."));

        let err = f.client.send_command(&Command::reload()).unwrap_err();
        assert!(matches!(err, Error::InteractionDisabled));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(f.transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_clean_close_codes() {
        let mut f = fixture();
        open(&mut f).await;
        link(&f).close_with(CloseInfo::clean(CLOSE_GOING_AWAY, "bye"));
        f.client.step().await;
        assert_eq!(status(&f), ConnectionStatus::ClosedClean);
        assert_eq!(f.notifier.count(Severity::Warning), 0);
        assert!(!f.client.state().snapshot().interaction_disabled);

        f.client.restart().expect("restart");
        link(&f).open();
        f.client.step().await;
        link(&f).close_with(CloseInfo::clean(4000, "kicked"));
        f.client.step().await;
        assert!(f.notifier.contains("Disconnected: kicked"));
    }

    #[tokio::test]
    async fn test_restart_after_failure() {
        let mut f = fixture_with(ClientOptions::new().with_max_reconnect_attempts(0));
        open(&mut f).await;
        drop_link(&mut f).await;
        assert_eq!(status(&f), ConnectionStatus::Failed);

        f.client.restart().expect("restart");
        assert_eq!(status(&f), ConnectionStatus::Connecting);
        assert_eq!(f.transport.open_count(), 2);
        assert_eq!(f.client.state().snapshot().reconnect_attempts, 0);
    }

    #[tokio::test]
    async fn test_restart_rejected_while_open() {
        let mut f = fixture();
        open(&mut f).await;

        let err = f.client.restart().unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(f.transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_link() {
        let mut f = fixture();
        open(&mut f).await;
        let link = link(&f);

        f.client.shutdown();

        assert!(f.client.is_stopped());
        assert_eq!(link.closed_with(), Some((1000, "client shutdown".to_string())));
        assert_eq!(status(&f), ConnectionStatus::ClosedClean);
        assert!(!f.client.step().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_reconnecting_ends_closed() {
        let mut f = fixture();
        open(&mut f).await;
        drop_link(&mut f).await;
        assert_eq!(status(&f), ConnectionStatus::Reconnecting);

        let connection = collect(f.client.bus(), EventKind::Connection);
        f.client.shutdown();

        assert_eq!(status(&f), ConnectionStatus::ClosedClean);
        assert!(matches!(
            connection.lock().as_slice(),
            [SessionEvent::Connection {
                connected: false,
                code: Some(1000)
            }]
        ));
        assert!(!f.client.step().await);
        assert_eq!(f.transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_when_idle_keeps_status() {
        let mut f = fixture();
        let connection = collect(f.client.bus(), EventKind::Connection);

        f.client.shutdown();

        assert!(f.client.is_stopped());
        assert_eq!(status(&f), ConnectionStatus::Idle);
        assert!(connection.lock().is_empty());
    }

    #[tokio::test]
    async fn test_session_completed_blocks_commands() {
        let mut f = fixture();
        open(&mut f).await;

        link(&f).push_json(&json!({"action": "session", "status": "completed"}));
        f.client.step().await;

        assert!(f.client.send_command(&Command::stop_session()).is_err());
        assert_eq!(link(&f).sent().len(), 1);
        assert_eq!(status(&f), ConnectionStatus::Open);
    }
}
