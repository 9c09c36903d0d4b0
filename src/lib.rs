//! # linkvisor: multi-tenant session supervisor for paired messaging links.
//!
//! Supervises many independent tenant sessions, each owning one connection
//! to a remote messaging network: pairing bring-up, bounded reconnects,
//! message delivery, and a broadcast event stream per session.
//!
//! ## Architecture
//! ```text
//! SessionRegistry (create / get / list / delete / shutdown_all)
//!     │
//!     ├─► SessionSupervisor "A" ──► Connector (via ConnectorFactory)
//!     │        │ state machine            │
//!     │        │ reconnect + restart      │ ConnectorEvents
//!     │        │ timers                   ▼
//!     │        └─► Broadcaster ◄── event pump
//!     │                │
//!     │                ├─► subscriber 1 (snapshot first, then live events)
//!     │                └─► subscriber N (+ periodic ping keepalive)
//!     │
//!     └─► SessionSupervisor "B" ... (fully isolated from "A")
//! ```
//!
//! ## Features
//! - **Explicit lifecycle**: one [`SessionState`] per session; every
//!   transition is observable as a broadcast [`Event`]
//! - **Bounded reconnects**: linear backoff with a delay cap and an attempt
//!   cap via [`ReconnectPolicy`]; exhaustion parks the session in `Failed`
//! - **Remote disconnects are not failures**: they reset the attempt counter
//!   and re-initialize after a fixed delay
//! - **Non-blocking fan-out**: slow subscribers are detached, never awaited
//! - **Race-free teardown**: generation-counter staleness guards make
//!   destroy / reconnect / connector-event interleavings safe
//! - **Bounded teardown**: a stuck connector release is abandoned after a
//!   grace period instead of wedging deletion or shutdown
//!
//! ## Quick Start
//! ```rust,no_run
//! use std::sync::Arc;
//! use linkvisor::{Config, ConnectorFactory, OutboundMessage, SessionRegistry};
//!
//! async fn run(factory: Arc<dyn ConnectorFactory>) -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SessionRegistry::new(Config::default(), factory);
//!
//!     let session = registry.create("Alice").await;
//!     let mut sub = session.subscribe().await;
//!     while let Some(event) = sub.rx.recv().await {
//!         println!("{}", serde_json::to_string(event.as_ref())?);
//!     }
//!
//!     session.send(OutboundMessage::text("15551234", "hello")).await?;
//!     registry.run_until_shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Integrating a transport
//! Implement [`Connector`] and [`ConnectorFactory`] for the actual network
//! client and hand the factory to [`SessionRegistry::new`]; the supervisors
//! drive everything else.

mod config;
mod connector;
mod error;
mod events;
mod policies;
mod registry;
mod session;

pub use config::Config;
pub use connector::{
    Connector, ConnectorEvent, ConnectorFactory, ConnectorRef, Contact, OutboundMessage,
};
pub use error::SessionError;
pub use events::{Broadcaster, Event, EventKind, Subscription, SubscriptionId};
pub use policies::ReconnectPolicy;
pub use registry::{wait_for_shutdown_signal, SessionRegistry};
pub use session::{SessionState, SessionSummary, SessionSupervisor};
