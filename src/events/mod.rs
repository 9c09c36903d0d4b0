//! Session events: data model and per-session fan-out.
//!
//! This module groups the event **data model** and the **broadcaster** used
//! to deliver events produced by one session to every attached subscriber.
//!
//! ## Contents
//! - [`EventKind`], [`Event`]: tagged event records with timestamps and
//!   optional metadata, serialized as `{kind, ..., at}` JSON
//! - [`Broadcaster`], [`Subscription`]: bounded per-subscriber queues with
//!   drop-on-overflow semantics and a periodic keepalive
//!
//! ## Quick reference
//! - **Publisher**: one `SessionSupervisor` per broadcaster (single producer).
//! - **Consumers**: any number of subscribers attached at any time; each sees
//!   one initial snapshot plus every event published after its attach, in
//!   publish order.

mod broadcaster;
mod event;

pub use broadcaster::{Broadcaster, Subscription, SubscriptionId};
pub use event::{Event, EventKind};
