//! Reconnect policy.
//!
//! This module groups the knobs that control **how long** the supervisor
//! waits between reconnect attempts and **when** it gives up.
//!
//! ## Contents
//! - [`ReconnectPolicy`] linear delay growth with a ceiling, plus a terminal
//!   attempt cap
//!
//! ## Quick wiring
//! ```text
//! Config { reconnect: ReconnectPolicy, .. }
//!      └─► session::SessionSupervisor uses:
//!           - reconnect.next(attempts) to arm the retry timer
//!           - reconnect.is_exhausted(attempts) to decide Reconnecting → Failed
//! ```
//!
//! ## Defaults
//! - `ReconnectPolicy::default()` → step=1s, max_delay=10s, max_attempts=5.

mod backoff;

pub use backoff::ReconnectPolicy;
