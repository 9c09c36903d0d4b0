//! Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings shared by every
//! [`SessionSupervisor`](crate::SessionSupervisor) created by a
//! [`SessionRegistry`](crate::SessionRegistry).
//!
//! ## Field semantics
//! - `reconnect`: backoff policy and terminal attempt cap for retries
//! - `restart_delay`: fixed delay before re-initializing after a logout or a
//!   remote-initiated disconnect (not backoff-driven)
//! - `keepalive_interval`: cadence of `ping` events published to subscribers
//! - `subscriber_capacity`: bounded queue size per subscriber (min 1, clamped)
//! - `connector_buffer`: capacity of the connector event channel (min 1)
//! - `release_grace`: maximum wait for a connector to release during teardown

use std::time::Duration;

use crate::policies::ReconnectPolicy;

/// Configuration shared by all sessions of a registry.
///
/// All fields are public for flexibility; prefer the clamped accessors where
/// sentinel values would otherwise leak into channel construction.
#[derive(Clone, Debug)]
pub struct Config {
    /// Reconnect backoff policy (delay growth + attempt cap).
    pub reconnect: ReconnectPolicy,

    /// Delay before re-initializing after `logout()` or a remote disconnect.
    ///
    /// Remote-initiated disconnects are not failures: the attempt counter is
    /// reset and this fixed delay is used instead of the backoff curve.
    pub restart_delay: Duration,

    /// Interval between `ping` keepalive events.
    ///
    /// Subscribers holding persistent streaming connections use pings to
    /// detect liveness; the events carry no semantic payload.
    pub keepalive_interval: Duration,

    /// Capacity of each subscriber's bounded event queue.
    ///
    /// A subscriber whose queue is full when an event is published is
    /// detached rather than allowed to stall the publisher.
    pub subscriber_capacity: usize,

    /// Capacity of the channel carrying connector events into the supervisor.
    pub connector_buffer: usize,

    /// Maximum time to wait for a connector's graceful release.
    ///
    /// Teardown proceeds after this bound so one stuck connector cannot block
    /// session deletion or process shutdown indefinitely.
    pub release_grace: Duration,
}

impl Config {
    /// Returns the subscriber queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn subscriber_capacity_clamped(&self) -> usize {
        self.subscriber_capacity.max(1)
    }

    /// Returns the connector event buffer clamped to a minimum of 1.
    #[inline]
    pub fn connector_buffer_clamped(&self) -> usize {
        self.connector_buffer.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `reconnect = ReconnectPolicy::default()` (1s step, 10s cap, 5 attempts)
    /// - `restart_delay = 5s` (matches the usual re-pair window)
    /// - `keepalive_interval = 15s`
    /// - `subscriber_capacity = 32`
    /// - `connector_buffer = 64`
    /// - `release_grace = 10s`
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            restart_delay: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(15),
            subscriber_capacity: 32,
            connector_buffer: 64,
            release_grace: Duration::from_secs(10),
        }
    }
}
