//! Concurrent session registry: the multi-tenant entry point.
//!
//! The registry owns every [`SessionSupervisor`] keyed by its opaque id and
//! exposes the create / get / list / delete surface a host application builds
//! its API on.
//!
//! ## Architecture
//! ```text
//! SessionRegistry
//!     ├─► create(name)  → new supervisor, bring-up scheduled, id returned
//!     ├─► get(id)       → Arc<SessionSupervisor> (send, subscribe, ...)
//!     ├─► list()        → Vec<SessionSummary>
//!     ├─► delete(id)    → remove from map, then destroy
//!     └─► shutdown_all  → destroy every session concurrently
//! ```
//!
//! ## Rules
//! - The map lock is held only for map mutation, never across connector
//!   calls; slow per-session work happens on the supervisor after the lock
//!   is dropped, so sessions cannot stall each other.
//! - `create` returns as soon as the supervisor is registered; bring-up runs
//!   on a detached task.
//! - `delete` removes the entry first, so the id is unreachable while the
//!   connector is still being released.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::connector::ConnectorFactory;
use crate::error::SessionError;
use crate::session::{SessionSummary, SessionSupervisor};

/// Registry of all live sessions in the process.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionSupervisor>>>,
    cfg: Config,
    factory: Arc<dyn ConnectorFactory>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    ///
    /// `factory` is shared by every session; each (re)initialization asks it
    /// for one fresh connector.
    pub fn new(cfg: Config, factory: Arc<dyn ConnectorFactory>) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            cfg,
            factory,
        })
    }

    /// Creates a session and schedules its bring-up.
    ///
    /// The returned supervisor is already registered under a fresh id;
    /// `initialize` runs on a detached task so creation never waits on the
    /// connector.
    pub async fn create(&self, display_name: impl Into<String>) -> Arc<SessionSupervisor> {
        let id = Uuid::new_v4().to_string();
        let session = SessionSupervisor::new(
            id.clone(),
            display_name,
            self.cfg.clone(),
            Arc::clone(&self.factory),
        );

        {
            let mut sessions = self.sessions.write().await;
            sessions.insert(id.clone(), Arc::clone(&session));
        }
        info!(session = %id, "session created");

        let starter = Arc::clone(&session);
        tokio::spawn(async move {
            starter.initialize().await;
        });
        session
    }

    /// Looks a session up by id.
    pub async fn get(&self, id: &str) -> Result<Arc<SessionSupervisor>, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })
    }

    /// Returns a summary of every session, oldest first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions: Vec<Arc<SessionSupervisor>> = {
            let map = self.sessions.read().await;
            map.values().cloned().collect()
        };

        let mut summaries = Vec::with_capacity(sessions.len());
        for s in sessions {
            summaries.push(s.summary().await);
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` when no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Deletes a session: unregisters the id, then destroys the supervisor.
    ///
    /// Removal happens before teardown so no caller can reach the session
    /// while its connector is still being released. Unknown ids yield
    /// [`SessionError::NotFound`].
    pub async fn delete(&self, id: &str) -> Result<(), SessionError> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions
                .remove(id)
                .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?
        };

        session.destroy().await;
        info!(session = %id, "session deleted");
        Ok(())
    }

    /// Destroys every session concurrently and empties the registry.
    ///
    /// Each destroy is independently bounded by the connector release grace,
    /// so total shutdown time is bounded by the slowest session, not the sum.
    pub async fn shutdown_all(&self) {
        let sessions: Vec<(String, Arc<SessionSupervisor>)> = {
            let mut map = self.sessions.write().await;
            map.drain().collect()
        };
        if sessions.is_empty() {
            return;
        }
        info!(count = sessions.len(), "shutting down all sessions");

        let mut joins = JoinSet::new();
        for (id, session) in sessions {
            joins.spawn(async move {
                session.destroy().await;
                debug!(session = %id, "session shut down");
            });
        }
        while joins.join_next().await.is_some() {}
    }

    /// Blocks until the process receives a termination signal, then runs
    /// [`shutdown_all`](Self::shutdown_all).
    ///
    /// Intended as the tail of a host application's `main`.
    pub async fn run_until_shutdown(&self) -> std::io::Result<()> {
        wait_for_shutdown_signal().await?;
        info!("termination signal received");
        self.shutdown_all().await;
        Ok(())
    }
}

/// Completes when the process receives `SIGINT`, `SIGTERM` or `SIGQUIT`
/// (plain Ctrl-C on non-unix platforms).
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Completes when the process receives Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::connector::{
        Connector, ConnectorEvent, ConnectorRef, Contact, OutboundMessage,
    };
    use crate::session::SessionState;

    struct NullConnector {
        released: AtomicU32,
    }

    #[async_trait]
    impl Connector for NullConnector {
        async fn send(&self, _message: OutboundMessage) -> Result<String, SessionError> {
            Ok("id".into())
        }

        async fn fetch_chats(&self) -> Result<Vec<Contact>, SessionError> {
            Ok(Vec::new())
        }

        async fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NullFactory;

    #[async_trait]
    impl ConnectorFactory for NullFactory {
        async fn start(
            &self,
            _session_id: &str,
            _events: mpsc::Sender<ConnectorEvent>,
        ) -> Result<ConnectorRef, SessionError> {
            Ok(Arc::new(NullConnector {
                released: AtomicU32::new(0),
            }) as ConnectorRef)
        }
    }

    fn registry() -> Arc<SessionRegistry> {
        SessionRegistry::new(Config::default(), Arc::new(NullFactory))
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_create_registers_and_schedules_bringup() {
        let reg = registry();
        let session = reg.create("Alice").await;
        assert_eq!(reg.len().await, 1);

        settle().await;
        assert_eq!(session.state().await, SessionState::Initializing);
        assert!(!session.id().is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let reg = registry();
        let a = reg.create("a").await;
        let b = reg.create("b").await;
        assert_ne!(a.id(), b.id());
        assert_eq!(reg.len().await, 2);
    }

    #[tokio::test]
    async fn test_get_returns_registered_session() {
        let reg = registry();
        let session = reg.create("Alice").await;
        let found = reg.get(session.id()).await.unwrap();
        assert_eq!(found.id(), session.id());
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let reg = registry();
        let err = reg.get("nope").await.unwrap_err();
        assert_eq!(err.as_label(), "not_found");
        assert!(matches!(err, SessionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_is_oldest_first() {
        let reg = registry();
        let a = reg.create("first").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = reg.create("second").await;

        let listed = reg.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a.id());
        assert_eq!(listed[1].id, b.id());
        assert_eq!(listed[0].display_name, "first");
    }

    #[tokio::test]
    async fn test_delete_removes_and_destroys() {
        let reg = registry();
        let session = reg.create("Alice").await;
        settle().await;

        reg.delete(session.id()).await.unwrap();
        assert!(reg.is_empty().await);
        assert_eq!(session.state().await, SessionState::Destroyed);

        let err = reg.delete(session.id()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_shutdown_all_destroys_everything() {
        let reg = registry();
        let a = reg.create("a").await;
        let b = reg.create("b").await;
        settle().await;

        reg.shutdown_all().await;
        assert!(reg.is_empty().await);
        assert_eq!(a.state().await, SessionState::Destroyed);
        assert_eq!(b.state().await, SessionState::Destroyed);

        // Idempotent on an empty registry.
        reg.shutdown_all().await;
    }
}
