//! Events broadcast by a session to its subscribers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Lifecycle events**: pairing and connection flow (qr-update,
//!   authenticated, connected, disconnected, auth-failure, max-reconnect,
//!   logout)
//! - **Traffic events**: message flow (incoming, outgoing)
//! - **Stream events**: subscriber bookkeeping (snapshot, ping, error)
//!
//! The [`Event`] struct carries optional metadata such as the pairing
//! payload, resolved identity, message bodies, and failure reasons. Events
//! serialize to tagged JSON records, e.g.:
//!
//! ```json
//! {"kind":"qr-update","qr":"XYZ","at":"2026-08-30T12:00:00Z","seq":7}
//! ```
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Per-subscriber delivery order matches publish order; `seq`
//! restores the global order across sessions if needed.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::SessionState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of session events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Initial state snapshot, delivered once to every new subscriber.
    ///
    /// Sets: `state`, `name`, `qr` (when a pairing payload is pending).
    Snapshot,

    /// A fresh pairing payload is available for scanning.
    ///
    /// Sets: `qr`.
    QrUpdate,

    /// The connector authenticated; session is completing bring-up.
    Authenticated,

    /// Session is fully connected.
    ///
    /// Sets: `name`, `number` (resolved identity).
    Connected,

    /// The remote side disconnected the session.
    ///
    /// Sets: `reason`.
    Disconnected,

    /// Authentication was rejected; a retry is scheduled.
    ///
    /// Sets: `reason`, `attempt`.
    AuthFailure,

    /// Reconnect attempts are exhausted; the session is terminally failed.
    ///
    /// Sets: `attempt` (the final attempt count).
    MaxReconnect,

    /// An administrative logout was performed; re-pairing will follow.
    Logout,

    /// A message arrived from the remote network.
    ///
    /// Sets: `from`, `body`.
    Incoming,

    /// A message was delivered to the remote network.
    ///
    /// Sets: `to`, `body`, `media`, `message_id`.
    Outgoing,

    /// Informational error; no state transition occurred.
    ///
    /// Sets: `reason`.
    Error,

    /// Liveness keepalive; carries no semantic payload.
    Ping,
}

/// Session event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp
/// - other optional fields are set depending on the [`EventKind`] and are
///   omitted from the JSON encoding when absent
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Event classification (the JSON `kind` tag).
    pub kind: EventKind,
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: DateTime<Utc>,

    /// Session state, for snapshot events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionState>,
    /// Display name (snapshot, connected).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Numeric identity resolved by the connector (connected).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Pairing payload (qr-update, snapshot while awaiting pairing).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    /// Sender of an incoming message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Target of an outgoing message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Message body (incoming, outgoing).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Whether an outgoing message carried an attachment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<bool>,
    /// Provider-assigned id of an outgoing message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Human-readable reason (disconnects, failures, errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Reconnect attempt count, where relevant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next global sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: Utc::now(),
            state: None,
            name: None,
            number: None,
            qr: None,
            from: None,
            to: None,
            body: None,
            media: None,
            message_id: None,
            reason: None,
            attempt: None,
        }
    }

    /// Attaches a session state (snapshot events).
    #[inline]
    pub fn with_state(mut self, state: SessionState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a display name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a resolved numeric identity.
    #[inline]
    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = Some(number.into());
        self
    }

    /// Attaches a pairing payload.
    #[inline]
    pub fn with_qr(mut self, qr: impl Into<String>) -> Self {
        self.qr = Some(qr.into());
        self
    }

    /// Attaches the sender of an incoming message.
    #[inline]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Attaches the target of an outgoing message.
    #[inline]
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Attaches a message body.
    #[inline]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Marks whether an attachment was included.
    #[inline]
    pub fn with_media(mut self, media: bool) -> Self {
        self.media = Some(media);
        self
    }

    /// Attaches a provider-assigned message id.
    #[inline]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::now(EventKind::Ping);
        let b = Event::now(EventKind::Ping);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let ev = Event::now(EventKind::QrUpdate).with_qr("XYZ");
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "qr-update");
        assert_eq!(json["qr"], "XYZ");
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let ev = Event::now(EventKind::Ping);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "ping");
        assert!(json.get("qr").is_none());
        assert!(json.get("reason").is_none());
        assert!(json.get("state").is_none());
    }

    #[test]
    fn test_outgoing_event_shape() {
        let ev = Event::now(EventKind::Outgoing)
            .with_to("1555@c.us")
            .with_body("hello")
            .with_media(false)
            .with_message_id("msg-1");
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "outgoing");
        assert_eq!(json["to"], "1555@c.us");
        assert_eq!(json["body"], "hello");
        assert_eq!(json["media"], false);
        assert_eq!(json["message_id"], "msg-1");
    }
}
