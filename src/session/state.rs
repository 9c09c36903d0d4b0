//! Explicit session states and registry-facing summaries.
//!
//! One tagged state per session replaces the implicit boolean pairs
//! (`isReady` / `isInitializing`) such systems tend to grow: every transition
//! is a single assignment and impossible combinations cannot be represented.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle state of one session.
///
/// ```text
/// Idle ─► Initializing ─► AwaitingPairing ⇄ Authenticating ─► Connected
///              ▲                                                  │
///              │                                             Disconnected
///              └────────────── Reconnecting ◄────────────────────┘
///                                   │
///                                   └─► Failed (terminal)
///
/// any ─► Destroyed (terminal, explicit teardown)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// Created, no connector yet.
    Idle,
    /// Connector bring-up in progress.
    Initializing,
    /// A pairing payload is pending a scan.
    AwaitingPairing,
    /// Credentials accepted, finishing bring-up.
    Authenticating,
    /// Fully connected; `send` and `list_contacts` are valid.
    Connected,
    /// The remote side dropped the connection; teardown in progress.
    Disconnected,
    /// Waiting on a retry timer.
    Reconnecting,
    /// Reconnect attempts exhausted. Terminal.
    Failed,
    /// Explicitly torn down. Terminal.
    Destroyed,
}

impl SessionState {
    /// Returns `true` for states from which no automatic transition occurs.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Failed | SessionState::Destroyed)
    }
}

/// Read-only snapshot of one session, as reported by the registry.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Opaque stable identifier.
    pub id: String,
    /// Current human label (authoritative once the connector reports one).
    pub display_name: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Creation timestamp, immutable.
    pub created_at: DateTime<Utc>,
    /// Number of contacts cached by the last `list_contacts` call.
    pub contact_count: usize,
    /// Reconnect attempts since the last successful connection.
    pub reconnect_attempts: u32,
}
