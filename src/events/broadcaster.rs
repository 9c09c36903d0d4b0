//! Non-blocking event fan-out to a dynamic set of subscribers.
//!
//! Provides [`Broadcaster`], which delivers the event stream of one session
//! to every currently-attached subscriber without ever blocking the publisher.
//!
//! ## Architecture
//! ```text
//! publish(event)
//!     │
//!     ├──► [queue 1] ──► subscriber 1 (drains at its own pace)
//!     │    (bounded)
//!     ├──► [queue 2] ──► subscriber 2
//!     │    (bounded)
//!     └──► [queue N] ──► subscriber N
//!          (bounded)        └── full/closed queue → subscriber detached
//!
//! keepalive task ──► publish(Ping) every keepalive_interval
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `publish()` uses `try_send` and returns immediately
//! - **Drop, don't stall**: a subscriber whose queue is full or closed is
//!   detached; the publisher and the other subscribers are unaffected
//! - **Per-subscriber FIFO**: each subscriber sees events in publish order
//! - **Late subscribers**: `attach()` delivers a synthetic snapshot event
//!   first, so a subscriber is never blind to present state
//! - **No cross-subscriber ordering**: subscribers attached at different
//!   times see different prefixes of the stream

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::event::{Event, EventKind};

/// Identifier of an attached subscriber, used for explicit detach.
pub type SubscriptionId = u64;

/// Handle returned by [`Broadcaster::attach`].
///
/// Dropping the receiver is equivalent to detaching: the next publish to a
/// closed queue removes the subscriber.
pub struct Subscription {
    /// Id to pass to [`Broadcaster::detach`].
    pub id: SubscriptionId,
    /// Event stream; yields the snapshot first, then subsequent events.
    pub rx: mpsc::Receiver<Arc<Event>>,
}

struct Shared {
    subscribers: Mutex<HashMap<SubscriptionId, mpsc::Sender<Arc<Event>>>>,
    next_id: AtomicU64,
    capacity: usize,
    closed: AtomicBool,
}

/// Fan-out coordinator for one session's subscribers.
///
/// Single producer (the session supervisor), dynamic set of consumers.
/// Publishes a periodic `ping` keepalive so subscribers holding persistent
/// streaming connections can detect liveness.
pub struct Broadcaster {
    shared: Arc<Shared>,
    keepalive: CancellationToken,
}

impl Broadcaster {
    /// Creates a broadcaster and starts its keepalive loop.
    ///
    /// ### Parameters
    /// - `capacity`: bounded queue size per subscriber (min 1, clamped)
    /// - `keepalive_interval`: cadence of `ping` events
    #[must_use]
    pub fn new(capacity: usize, keepalive_interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
        });

        let keepalive = CancellationToken::new();
        let token = keepalive.clone();
        let weak = Arc::downgrade(&shared);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(keepalive_interval.max(Duration::from_millis(1)));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tick.tick().await; // immediate first tick carries no information
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => {
                        let Some(shared) = weak.upgrade() else { break };
                        Self::fan_out(&shared, Arc::new(Event::now(EventKind::Ping)));
                    }
                }
            }
        });

        Self { shared, keepalive }
    }

    /// Registers a new subscriber and immediately delivers `snapshot`.
    ///
    /// The snapshot is queued before any subsequent publish, so a late
    /// subscriber always observes present state first. Attaching to a closed
    /// broadcaster yields a subscription that delivers the snapshot and then
    /// ends.
    pub fn attach(&self, snapshot: Event) -> Subscription {
        let id = self.shared.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        let (tx, rx) = mpsc::channel(self.shared.capacity);

        // Fresh channel with capacity >= 1: the snapshot always fits.
        let _ = tx.try_send(Arc::new(snapshot));

        // Flag checked under the lock so a concurrent close() cannot leave a
        // subscriber registered after the set was cleared.
        let mut subs = self.shared.subscribers.lock().expect("subscriber set poisoned");
        if !self.shared.closed.load(AtomicOrdering::Acquire) {
            subs.insert(id, tx);
        }
        Subscription { id, rx }
    }

    /// Removes a subscriber; idempotent.
    ///
    /// Safe to call from the subscriber's own termination path or externally;
    /// detaching an unknown id is a no-op.
    pub fn detach(&self, id: SubscriptionId) {
        let mut subs = self.shared.subscribers.lock().expect("subscriber set poisoned");
        subs.remove(&id);
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Never blocks and never fails: a subscriber whose queue is full or
    /// whose receiver is gone is detached instead of stalling the publisher.
    pub fn publish(&self, event: Event) {
        Self::fan_out(&self.shared, Arc::new(event));
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().expect("subscriber set poisoned").len()
    }

    /// Closes the broadcaster: stops the keepalive and drops every
    /// subscriber channel so receivers observe end-of-stream. Idempotent.
    pub fn close(&self) {
        self.shared.closed.store(true, AtomicOrdering::Release);
        self.keepalive.cancel();
        let mut subs = self.shared.subscribers.lock().expect("subscriber set poisoned");
        subs.clear();
    }

    fn fan_out(shared: &Shared, event: Arc<Event>) {
        let mut dead: Vec<SubscriptionId> = Vec::new();
        let mut subs = shared.subscribers.lock().expect("subscriber set poisoned");

        for (id, tx) in subs.iter() {
            match tx.try_send(Arc::clone(&event)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(subscriber = id, "subscriber queue full, detaching");
                    dead.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(subscriber = id, "subscriber gone, detaching");
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            subs.remove(&id);
        }
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.keepalive.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    fn snapshot() -> Event {
        Event::now(EventKind::Snapshot).with_state(SessionState::Idle)
    }

    #[tokio::test]
    async fn test_snapshot_delivered_first() {
        let b = Broadcaster::new(8, Duration::from_secs(3600));
        let mut sub = b.attach(snapshot());
        b.publish(Event::now(EventKind::Authenticated));

        let first = sub.rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::Snapshot);
        let second = sub.rx.recv().await.unwrap();
        assert_eq!(second.kind, EventKind::Authenticated);
    }

    #[tokio::test]
    async fn test_publish_order_preserved_per_subscriber() {
        let b = Broadcaster::new(8, Duration::from_secs(3600));
        let mut sub = b.attach(snapshot());

        b.publish(Event::now(EventKind::QrUpdate).with_qr("a"));
        b.publish(Event::now(EventKind::Authenticated));
        b.publish(Event::now(EventKind::Connected));

        let _ = sub.rx.recv().await.unwrap(); // snapshot
        assert_eq!(sub.rx.recv().await.unwrap().kind, EventKind::QrUpdate);
        assert_eq!(sub.rx.recv().await.unwrap().kind, EventKind::Authenticated);
        assert_eq!(sub.rx.recv().await.unwrap().kind, EventKind::Connected);
    }

    #[tokio::test]
    async fn test_slow_subscriber_detached_fast_one_unaffected() {
        let b = Broadcaster::new(2, Duration::from_secs(3600));
        let slow = b.attach(snapshot());
        let mut fast = b.attach(snapshot());
        assert_eq!(b.subscriber_count(), 2);

        // The fast subscriber drains between publishes. The slow one never
        // does; its queue holds the snapshot plus one event, so the second
        // publish overflows it and only the slow one is detached.
        b.publish(Event::now(EventKind::Authenticated));
        let _ = fast.rx.recv().await.unwrap(); // snapshot
        assert_eq!(fast.rx.recv().await.unwrap().kind, EventKind::Authenticated);

        b.publish(Event::now(EventKind::Connected));
        assert_eq!(b.subscriber_count(), 1);
        assert_eq!(fast.rx.recv().await.unwrap().kind, EventKind::Connected);
        drop(slow);
    }

    #[tokio::test]
    async fn test_dropped_receiver_detached_on_next_publish() {
        let b = Broadcaster::new(8, Duration::from_secs(3600));
        let sub = b.attach(snapshot());
        drop(sub.rx);

        b.publish(Event::now(EventKind::Ping));
        assert_eq!(b.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_detach_is_idempotent() {
        let b = Broadcaster::new(8, Duration::from_secs(3600));
        let sub = b.attach(snapshot());
        b.detach(sub.id);
        b.detach(sub.id);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_close_ends_subscriber_streams() {
        let b = Broadcaster::new(8, Duration::from_secs(3600));
        let mut sub = b.attach(snapshot());
        b.close();
        b.close(); // idempotent

        let first = sub.rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::Snapshot);
        assert!(sub.rx.recv().await.is_none());

        // Publishing after close reaches nobody and must not panic.
        b.publish(Event::now(EventKind::Ping));
        assert_eq!(b.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_pings_on_interval() {
        let b = Broadcaster::new(8, Duration::from_secs(15));
        let mut sub = b.attach(snapshot());
        let _ = sub.rx.recv().await.unwrap(); // snapshot

        tokio::time::advance(Duration::from_secs(16)).await;
        let ev = sub.rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::Ping);
    }
}
