//! SessionSupervisor: single-tenant connection supervisor.
//!
//! Supervises one tenant's connection with:
//! - an explicit state machine driven by [`ConnectorEvent`]s and commands,
//! - bounded reconnects per [`ReconnectPolicy`](crate::ReconnectPolicy),
//! - two named, mutually-exclusive timer slots (reconnect, restart),
//! - bounded-grace connector teardown,
//! - broadcast fan-out through a per-session [`Broadcaster`].
//!
//! ## Event flow
//! ```text
//! initialize() ──► factory.start() ──► connector ──► event pump ──► on_connector_event()
//!                                                                          │
//!            state transition + broadcast ◄───────────────────────────────┘
//!
//! PairingCode  → AwaitingPairing   + qr-update
//! Authenticated → Authenticating   + authenticated
//! Ready         → Connected        + connected (identity), attempts reset
//! AuthFailure   → Reconnecting     + auth-failure, attempts += 1, retry timer
//! Disconnected  → Reconnecting     + disconnected, attempts = 0, restart timer
//! start Err     → Reconnecting     + error, attempts += 1, retry timer
//!
//! retry timer fires:
//!   attempts <  max → initialize()
//!   attempts >= max → Failed + max-reconnect (no further timers)
//! ```
//!
//! ## Rules
//! - All mutable session state lives behind **one** `tokio::Mutex`; connector
//!   events, commands, and timer firings are serialized through it (single
//!   writer). Different sessions share nothing mutable.
//! - Every (re)initialization and every teardown bumps a **generation**
//!   counter; connector events and timer firings carry the generation they
//!   were armed under and are ignored once it is stale. This is what makes
//!   teardown race-free without aborting tasks from within themselves.
//! - Arming a timer slot cancels any pending timer of either slot; the two
//!   slots are mutually exclusive by construction.
//! - `release()` is bounded by `Config::release_grace`: a stuck connector is
//!   abandoned (with a warning), never awaited forever.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connector::{ConnectorEvent, ConnectorFactory, ConnectorRef, Contact, OutboundMessage};
use crate::error::SessionError;
use crate::events::{Broadcaster, Event, EventKind, Subscription, SubscriptionId};
use crate::session::state::{SessionState, SessionSummary};

/// Mutable state of one session; owned exclusively by the session's lock.
struct Inner {
    state: SessionState,
    display_name: String,
    /// Non-empty only while awaiting pairing.
    pairing_payload: String,
    /// Attempts since the last successful connection (or explicit reset).
    reconnect_attempts: u32,
    /// Contact snapshot cached by the last `list_contacts` call.
    contacts: Vec<Contact>,
    /// The live connector, if any. Never shared across sessions.
    connector: Option<ConnectorRef>,
    /// Backoff-driven retry timer slot.
    reconnect_timer: Option<JoinHandle<()>>,
    /// Fixed-delay re-initialize timer slot (logout, remote disconnect).
    restart_timer: Option<JoinHandle<()>>,
    /// Pump task forwarding connector events into the supervisor.
    pump: Option<JoinHandle<()>>,
    /// Bumped on every (re)initialization and teardown; stale events and
    /// timer firings are rejected against it.
    generation: u64,
}

impl Inner {
    /// Cancels both timer slots. Invoked at every transition that supersedes
    /// a pending timer; aborting an already-finished task is a no-op.
    fn cancel_timers(&mut self) {
        if let Some(h) = self.reconnect_timer.take() {
            h.abort();
        }
        if let Some(h) = self.restart_timer.take() {
            h.abort();
        }
    }
}

/// Supervisor owning one tenant's connection state machine.
///
/// Constructed by the [`SessionRegistry`](crate::SessionRegistry); all
/// mutation goes through its public commands and its connector event pump.
pub struct SessionSupervisor {
    id: String,
    created_at: DateTime<Utc>,
    cfg: Config,
    factory: Arc<dyn ConnectorFactory>,
    broadcaster: Broadcaster,
    inner: Mutex<Inner>,
}

impl fmt::Debug for SessionSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSupervisor")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl SessionSupervisor {
    /// Creates a supervisor in `Idle` with no connector.
    ///
    /// Bring-up does not begin until [`initialize`](Self::initialize) runs;
    /// the registry schedules that asynchronously so creation returns
    /// immediately.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        cfg: Config,
        factory: Arc<dyn ConnectorFactory>,
    ) -> Arc<Self> {
        let broadcaster =
            Broadcaster::new(cfg.subscriber_capacity_clamped(), cfg.keepalive_interval);
        Arc::new(Self {
            id: id.into(),
            created_at: Utc::now(),
            cfg,
            factory,
            broadcaster,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                display_name: display_name.into(),
                pairing_payload: String::new(),
                reconnect_attempts: 0,
                contacts: Vec::new(),
                connector: None,
                reconnect_timer: None,
                restart_timer: None,
                pump: None,
                generation: 0,
            }),
        })
    }

    /// Opaque stable identifier, assigned at creation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation timestamp, immutable.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Read-only snapshot for registry listings.
    pub async fn summary(&self) -> SessionSummary {
        let inner = self.inner.lock().await;
        SessionSummary {
            id: self.id.clone(),
            display_name: inner.display_name.clone(),
            state: inner.state,
            created_at: self.created_at,
            contact_count: inner.contacts.len(),
            reconnect_attempts: inner.reconnect_attempts,
        }
    }

    /// Starts (or restarts) connector bring-up.
    ///
    /// Idempotent guard: a call while already `Initializing`,
    /// `Authenticating` or `Connected` is a no-op, so duplicate connector
    /// instances cannot be created. `Failed` and `Destroyed` are terminal
    /// for automatic bring-up; only [`logout`](Self::logout) revives a
    /// failed session.
    ///
    /// The slow `ConnectorFactory::start` call runs without the session lock
    /// held; the result is re-validated against the generation counter before
    /// the connector is stored, so a teardown that happened mid-start wins.
    ///
    /// A start failure that [`SessionError::is_retryable`] reports as
    /// transient is absorbed into the retry loop; a permanent one parks the
    /// session in `Failed` immediately, with no retry timer.
    pub async fn initialize(self: &Arc<Self>) {
        let (generation, events_tx, stale) = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                SessionState::Initializing
                | SessionState::Authenticating
                | SessionState::Connected
                | SessionState::Failed
                | SessionState::Destroyed => {
                    debug!(session = %self.id, state = ?inner.state, "initialize ignored");
                    return;
                }
                _ => {}
            }

            inner.cancel_timers();
            inner.generation += 1;
            inner.state = SessionState::Initializing;
            inner.pairing_payload.clear();

            let generation = inner.generation;
            let (tx, mut rx) = mpsc::channel(self.cfg.connector_buffer_clamped());
            let me = Arc::clone(self);
            let pump = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    me.on_connector_event(generation, ev).await;
                }
            });
            if let Some(old) = inner.pump.replace(pump) {
                old.abort();
            }
            (generation, tx, inner.connector.take())
        };

        // A connector left over from a superseded bring-up (e.g. a retry
        // after an auth failure) is released before the fresh start.
        if let Some(old) = stale {
            self.release_bounded(old).await;
        }

        debug!(session = %self.id, generation, "starting connector");
        match self.factory.start(&self.id, events_tx).await {
            Ok(connector) => {
                let mut inner = self.inner.lock().await;
                if inner.generation != generation || inner.state == SessionState::Destroyed {
                    // Superseded mid-start; the fresh connector is ours to clean up.
                    drop(inner);
                    self.release_bounded(connector).await;
                    return;
                }
                inner.connector = Some(connector);
            }
            Err(err) => {
                warn!(session = %self.id, error = %err, "connector start failed");
                let mut inner = self.inner.lock().await;
                if inner.generation != generation || inner.state.is_terminal() {
                    return;
                }
                if !err.is_retryable() {
                    // A permanent bring-up fault (e.g. no provisioned account)
                    // is not worth a retry curve.
                    inner.state = SessionState::Failed;
                    inner.cancel_timers();
                    self.broadcaster
                        .publish(Event::now(EventKind::Error).with_reason(err.as_message()));
                    return;
                }
                inner.reconnect_attempts += 1;
                self.broadcaster.publish(
                    Event::now(EventKind::Error)
                        .with_reason(err.as_message())
                        .with_attempt(inner.reconnect_attempts),
                );
                self.enter_reconnecting(&mut inner);
            }
        }
    }

    /// Sends one message. Valid only in `Connected`.
    ///
    /// On success broadcasts an `outgoing` event carrying the
    /// provider-assigned message id. A connector-level failure surfaces as
    /// [`SessionError::DeliveryFailed`] with no state transition and no
    /// broadcast; callers retry on their own terms.
    pub async fn send(&self, message: OutboundMessage) -> Result<String, SessionError> {
        let inner = self.inner.lock().await;
        if inner.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        let connector = inner.connector.clone().ok_or(SessionError::NotConnected)?;

        let to = message.target.clone();
        let body = message.body.clone();
        let media = message.attachment.is_some();

        match connector.send(message).await {
            Ok(message_id) => {
                self.broadcaster.publish(
                    Event::now(EventKind::Outgoing)
                        .with_to(to)
                        .with_body(body)
                        .with_media(media)
                        .with_message_id(message_id.clone()),
                );
                Ok(message_id)
            }
            Err(err) => Err(match err {
                SessionError::DeliveryFailed { .. } => err,
                other => SessionError::DeliveryFailed {
                    reason: other.as_message(),
                },
            }),
        }
    }

    /// Returns a contact snapshot. Valid only in `Connected`.
    ///
    /// The snapshot is also cached on the session so the registry can report
    /// `contact_count` without touching the connector.
    pub async fn list_contacts(&self) -> Result<Vec<Contact>, SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Connected {
            return Err(SessionError::NotConnected);
        }
        let connector = inner.connector.clone().ok_or(SessionError::NotConnected)?;
        let contacts = connector.fetch_chats().await?;
        inner.contacts = contacts.clone();
        Ok(contacts)
    }

    /// Tears the connector down and schedules a fresh bring-up.
    ///
    /// Clears the pairing payload and resets the attempt counter (this is an
    /// administrative recreation, not a failure), broadcasts `logout`, and
    /// arms the restart timer. The session sits in `Idle` until the timer
    /// fires. No-op once `Destroyed`.
    pub async fn logout(self: &Arc<Self>) {
        let connector = {
            let mut inner = self.inner.lock().await;
            if inner.state == SessionState::Destroyed {
                return;
            }
            inner.cancel_timers();
            inner.generation += 1;
            inner.state = SessionState::Idle;
            inner.pairing_payload.clear();
            inner.reconnect_attempts = 0;
            let connector = inner.connector.take();

            self.broadcaster.publish(Event::now(EventKind::Logout));
            info!(session = %self.id, "logout, re-pairing scheduled");
            self.arm_restart(&mut inner, self.cfg.restart_delay);
            connector
        };
        if let Some(c) = connector {
            self.release_bounded(c).await;
        }
    }

    /// Destroys the session: cancels all timers, releases the connector with
    /// bounded grace, and closes every subscriber stream.
    ///
    /// Idempotent: a second call observes `Destroyed` and returns.
    pub async fn destroy(&self) {
        let (connector, pump) = {
            let mut inner = self.inner.lock().await;
            if inner.state == SessionState::Destroyed {
                return;
            }
            inner.cancel_timers();
            inner.generation += 1;
            inner.state = SessionState::Destroyed;
            inner.pairing_payload.clear();
            (inner.connector.take(), inner.pump.take())
        };

        if let Some(c) = connector {
            self.release_bounded(c).await;
        }
        if let Some(p) = pump {
            p.abort();
        }
        self.broadcaster.close();
        info!(session = %self.id, "session destroyed");
    }

    /// Attaches a subscriber; the returned stream starts with a `snapshot`
    /// event carrying present state, display name, and any pending pairing
    /// payload.
    pub async fn subscribe(&self) -> Subscription {
        let inner = self.inner.lock().await;
        let mut snapshot = Event::now(EventKind::Snapshot)
            .with_state(inner.state)
            .with_name(inner.display_name.clone());
        if !inner.pairing_payload.is_empty() {
            snapshot = snapshot.with_qr(inner.pairing_payload.clone());
        }
        self.broadcaster.attach(snapshot)
    }

    /// Detaches a subscriber; idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.broadcaster.detach(id);
    }

    /// Number of attached subscribers (for inspection and tests).
    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    // ---------------------------
    // Connector event handling
    // ---------------------------

    async fn on_connector_event(self: &Arc<Self>, generation: u64, event: ConnectorEvent) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation || inner.state.is_terminal() {
            debug!(session = %self.id, ?event, "stale connector event ignored");
            return;
        }

        match event {
            ConnectorEvent::PairingCode(code) => {
                if matches!(
                    inner.state,
                    SessionState::Initializing | SessionState::AwaitingPairing
                ) {
                    inner.state = SessionState::AwaitingPairing;
                    inner.pairing_payload = code.clone();
                    self.broadcaster
                        .publish(Event::now(EventKind::QrUpdate).with_qr(code));
                    debug!(session = %self.id, "pairing code generated");
                }
            }
            ConnectorEvent::Authenticated => {
                if inner.state == SessionState::AwaitingPairing {
                    inner.state = SessionState::Authenticating;
                    self.broadcaster.publish(Event::now(EventKind::Authenticated));
                }
            }
            ConnectorEvent::Ready { number, name } => {
                if matches!(
                    inner.state,
                    SessionState::Initializing
                        | SessionState::AwaitingPairing
                        | SessionState::Authenticating
                ) {
                    inner.state = SessionState::Connected;
                    inner.pairing_payload.clear();
                    inner.reconnect_attempts = 0;
                    inner.cancel_timers();
                    if !name.is_empty() {
                        inner.display_name = name;
                    }
                    info!(session = %self.id, name = %inner.display_name, number = %number, "connected");
                    self.broadcaster.publish(
                        Event::now(EventKind::Connected)
                            .with_name(inner.display_name.clone())
                            .with_number(number),
                    );
                }
            }
            ConnectorEvent::AuthFailure(reason) => {
                inner.reconnect_attempts += 1;
                warn!(session = %self.id, %reason, attempt = inner.reconnect_attempts, "auth failure");
                self.broadcaster.publish(
                    Event::now(EventKind::AuthFailure)
                        .with_reason(reason)
                        .with_attempt(inner.reconnect_attempts),
                );
                self.enter_reconnecting(&mut inner);
            }
            ConnectorEvent::Disconnected(reason) => {
                // Remote-initiated: not a failure. Attempts reset to zero and
                // the fixed restart delay applies instead of the backoff curve.
                info!(session = %self.id, %reason, "remote disconnect");
                inner.state = SessionState::Disconnected;
                inner.pairing_payload.clear();
                inner.reconnect_attempts = 0;
                self.broadcaster
                    .publish(Event::now(EventKind::Disconnected).with_reason(reason));

                inner.cancel_timers();
                inner.generation += 1;
                let connector = inner.connector.take();
                inner.state = SessionState::Reconnecting;
                self.arm_restart(&mut inner, self.cfg.restart_delay);
                drop(inner);

                if let Some(c) = connector {
                    self.release_bounded(c).await;
                }
            }
            ConnectorEvent::Incoming { from, body } => {
                self.broadcaster.publish(
                    Event::now(EventKind::Incoming)
                        .with_from(from)
                        .with_body(body),
                );
            }
            ConnectorEvent::Error(message) => {
                // Informational only; no transition.
                self.broadcaster
                    .publish(Event::now(EventKind::Error).with_reason(message));
            }
        }
    }

    // ---------------------------
    // Timers
    // ---------------------------

    /// Enters `Reconnecting` and arms the backoff-driven retry timer.
    fn enter_reconnecting(self: &Arc<Self>, inner: &mut Inner) {
        inner.state = SessionState::Reconnecting;
        inner.cancel_timers();
        let delay = self.cfg.reconnect.next(inner.reconnect_attempts);
        let generation = inner.generation;
        let me = Arc::clone(self);
        inner.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            me.reconnect_fired(generation).await;
        }));
    }

    /// Arms the fixed-delay restart timer (logout, remote disconnect).
    fn arm_restart(self: &Arc<Self>, inner: &mut Inner, delay: std::time::Duration) {
        inner.cancel_timers();
        let generation = inner.generation;
        let me = Arc::clone(self);
        inner.restart_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            me.restart_fired(generation).await;
        }));
    }

    async fn reconnect_fired(self: Arc<Self>, generation: u64) {
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation || inner.state != SessionState::Reconnecting {
                return;
            }
            // This task *is* the reconnect timer: clear the slot without
            // aborting so the upcoming initialize() cannot cancel itself.
            inner.reconnect_timer = None;

            if self.cfg.reconnect.is_exhausted(inner.reconnect_attempts) {
                let attempts = inner.reconnect_attempts;
                inner.state = SessionState::Failed;
                if let Some(h) = inner.restart_timer.take() {
                    h.abort();
                }
                let connector = inner.connector.take();
                warn!(session = %self.id, attempts, "reconnect attempts exhausted");
                self.broadcaster.publish(
                    Event::now(EventKind::MaxReconnect)
                        .with_attempt(attempts)
                        .with_reason(SessionError::MaxRetriesExceeded { attempts }.as_message()),
                );
                drop(inner);
                if let Some(c) = connector {
                    self.release_bounded(c).await;
                }
                return;
            }
        }
        self.initialize().await;
    }

    async fn restart_fired(self: Arc<Self>, generation: u64) {
        {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation
                || !matches!(inner.state, SessionState::Idle | SessionState::Reconnecting)
            {
                return;
            }
            inner.restart_timer = None;
        }
        self.initialize().await;
    }

    // ---------------------------
    // Teardown
    // ---------------------------

    /// Releases a connector, bounded by `Config::release_grace`.
    ///
    /// A connector that does not release in time is abandoned so a stuck
    /// transport cannot block deletion or process shutdown. Never raises.
    async fn release_bounded(&self, connector: ConnectorRef) {
        let grace = self.cfg.release_grace;
        if tokio::time::timeout(grace, connector.release()).await.is_err() {
            warn!(session = %self.id, ?grace, "connector release timed out, abandoning");
        }
    }
}
