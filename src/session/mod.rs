//! Session core: state machine and per-tenant supervisor.
//!
//! This module contains the heart of the crate. The only public API is
//! [`SessionSupervisor`] (plus the [`SessionState`] and [`SessionSummary`]
//! data types); the registry constructs supervisors and everything else
//! flows through their commands and broadcast events.
//!
//! Internal modules:
//! - [`state`]: the explicit session state enum and summary snapshot;
//! - [`supervisor`]: owns one tenant's connector, timers, and broadcaster,
//!   and drives every transition under a single-writer lock.

mod state;
mod supervisor;

pub use state::{SessionState, SessionSummary};
pub use supervisor::SessionSupervisor;
