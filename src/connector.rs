//! Connector seam: the external collaborator owning the actual transport.
//!
//! linkvisor never talks to a remote messaging network itself. Each session
//! drives an opaque [`Connector`] produced by a [`ConnectorFactory`]; the
//! connector reports lifecycle through [`ConnectorEvent`]s pushed into a
//! channel owned by the supervisor.
//!
//! ## Contract
//! - `ConnectorFactory::start` constructs **one fresh connector** per
//!   (re)initialization and begins its bring-up; pairing and authentication
//!   progress arrives asynchronously as events.
//! - A connector is owned by exactly one session at a time; ownership is
//!   never shared.
//! - [`Connector::release`] is idempotent and must tolerate double release;
//!   the supervisor bounds it with a grace timeout during teardown.
//!
//! ## Event flow
//! ```text
//! factory.start(id, tx) ──► connector
//!      connector ── PairingCode ──► tx ──► supervisor (AwaitingPairing)
//!      connector ── Authenticated ─► tx ──► supervisor (Authenticating)
//!      connector ── Ready ─────────► tx ──► supervisor (Connected)
//!      connector ── Disconnected ──► tx ──► supervisor (Reconnecting)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::SessionError;

/// Lifecycle events reported by a connector to its owning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorEvent {
    /// A scannable pairing code was generated.
    PairingCode(String),
    /// The remote service accepted the session's credentials.
    Authenticated,
    /// The connection is fully established; carries the resolved identity.
    Ready {
        /// Numeric identity on the remote network.
        number: String,
        /// Authoritative display name reported by the remote service.
        name: String,
    },
    /// Authentication was rejected.
    AuthFailure(String),
    /// The remote side dropped the connection (e.g. remote logout).
    Disconnected(String),
    /// A message arrived from the remote network.
    Incoming {
        /// Sender address.
        from: String,
        /// Message body.
        body: String,
    },
    /// Informational transport error; the connection may still recover.
    Error(String),
}

/// An outbound message handed to [`Connector::send`].
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    /// Destination address on the remote network.
    pub target: String,
    /// Message body (used as caption when an attachment is present).
    pub body: String,
    /// Optional path of a file to attach.
    pub attachment: Option<PathBuf>,
    /// Optional provider message id this message replies to.
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    /// Creates a plain text message.
    pub fn text(target: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            body: body.into(),
            attachment: None,
            reply_to: None,
        }
    }

    /// Attaches a file path.
    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(path.into());
        self
    }

    /// Marks this message as a reply to a previous provider message id.
    pub fn with_reply_to(mut self, id: impl Into<String>) -> Self {
        self.reply_to = Some(id.into());
        self
    }
}

/// A contact known to the remote network, as reported by the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    /// Display name, best-effort.
    pub name: String,
    /// Numeric identity.
    pub number: String,
}

/// A live connection owned by one session.
///
/// Implementations wrap whatever transport actually reaches the remote
/// messaging network. All methods may be slow; the supervisor never invokes
/// them while holding registry-wide locks.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Delivers one outbound message; returns the provider-assigned id.
    ///
    /// Failures surface as [`SessionError::DeliveryFailed`] and cause no
    /// state transition.
    async fn send(&self, message: OutboundMessage) -> Result<String, SessionError>;

    /// Returns a snapshot of known contacts.
    async fn fetch_chats(&self) -> Result<Vec<Contact>, SessionError>;

    /// Releases all transport resources.
    ///
    /// Must be idempotent: releasing an already-released connector is a
    /// no-op, never a panic. The supervisor bounds this call with
    /// `Config::release_grace` and abandons it on timeout.
    async fn release(&self);
}

/// Shared handle to a live connector.
pub type ConnectorRef = Arc<dyn Connector>;

/// Factory producing one fresh connector per session (re)initialization.
#[async_trait]
pub trait ConnectorFactory: Send + Sync + 'static {
    /// Constructs and starts a connector for the given session.
    ///
    /// Lifecycle progress (pairing code, authentication, readiness,
    /// disconnects, traffic) is pushed into `events`. A synchronous `Err`
    /// means bring-up could not even begin; the supervisor retries errors
    /// that [`SessionError::is_retryable`] reports as transient and parks
    /// the session in `Failed` on permanent ones.
    async fn start(
        &self,
        session_id: &str,
        events: mpsc::Sender<ConnectorEvent>,
    ) -> Result<ConnectorRef, SessionError>;
}
