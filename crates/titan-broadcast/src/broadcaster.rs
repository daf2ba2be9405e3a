//! `Broadcaster` — connection/user/group index plus bounded-concurrency
//! fan-out that seals per recipient.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use futures::future::join_all;
use titan_session::SessionManager;
use tracing::warn;

use crate::sender::ConnectionSender;

/// Per-hub-type broadcaster state. Cheaply `Clone`-able (everything behind
/// `Arc`), so a hub can hand one instance to every connection task.
pub struct Broadcaster<S: ConnectionSender> {
    connection_to_user: DashMap<String, String>,
    group_connections: DashMap<String, DashSet<String>>,
    session_manager: Arc<SessionManager>,
    sender: Arc<S>,
    send_failures: AtomicU64,
}

impl<S: ConnectionSender> Broadcaster<S> {
    pub fn new(session_manager: Arc<SessionManager>, sender: Arc<S>) -> Self {
        Self {
            connection_to_user: DashMap::new(),
            group_connections: DashMap::new(),
            session_manager,
            sender,
            send_failures: AtomicU64::new(0),
        }
    }

    pub fn send_failure_count(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    pub fn register(&self, connection_id: impl Into<String>, user_id: impl Into<String>) {
        self.connection_to_user.insert(connection_id.into(), user_id.into());
    }

    /// Drop the connection from the index and every group it belonged to.
    pub fn unregister(&self, connection_id: &str) {
        self.connection_to_user.remove(connection_id);
        for entry in self.group_connections.iter() {
            entry.value().remove(connection_id);
        }
    }

    pub fn add_to_group(&self, connection_id: impl Into<String>, group_name: &str) {
        self.group_connections
            .entry(group_name.to_string())
            .or_insert_with(DashSet::new)
            .insert(connection_id.into());
    }

    pub fn remove_from_group(&self, connection_id: &str, group_name: &str) {
        if let Some(set) = self.group_connections.get(group_name) {
            set.remove(connection_id);
        }
    }

    fn user_of(&self, connection_id: &str) -> Option<String> {
        self.connection_to_user.get(connection_id).map(|e| e.clone())
    }

    /// Seal (when a session exists and encryption is enabled) or send
    /// plaintext (otherwise), per the enforcement policy. Drops silently
    /// with a warning when encryption is required but the recipient has no
    /// session.
    pub async fn send_to_connection(&self, connection_id: &str, method_name: &str, payload: &[u8]) {
        let Some(user_id) = self.user_of(connection_id) else {
            warn!(connection_id, "send_to_connection: no such connection");
            return;
        };

        let config = self.session_manager.config();
        let has_session = self.session_manager.is_enabled(&user_id).await;

        if config.enabled && has_session {
            match self.session_manager.seal(&user_id, payload, None).await {
                Ok(envelope) => {
                    if let Err(err) = self.sender.send_sealed(connection_id, method_name, &envelope).await {
                        self.send_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(connection_id, error = %err, "sealed send failed");
                    }
                }
                Err(err) => {
                    self.send_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(connection_id, error = %err, "seal failed during broadcast");
                }
            }
            return;
        }

        if config.enabled && config.required && !has_session {
            self.send_failures.fetch_add(1, Ordering::Relaxed);
            warn!(connection_id, user_id, "dropping broadcast: encryption required but no session");
            return;
        }

        if let Err(err) = self.sender.send_plain(connection_id, method_name, payload).await {
            self.send_failures.fetch_add(1, Ordering::Relaxed);
            warn!(connection_id, error = %err, "plaintext send failed");
        }
    }

    /// Snapshot the group's connections and fan out in batches of
    /// `broadcast_max_concurrency`, awaiting each batch before the next. A
    /// per-connection failure never stops the fan-out.
    pub async fn send_to_group(&self, group_name: &str, method_name: &str, payload: &[u8]) {
        let Some(connections) = self.group_connections.get(group_name) else {
            return;
        };
        let snapshot: Vec<String> = connections.iter().map(|c| c.clone()).collect();
        drop(connections);

        let batch_size = self.session_manager.config().broadcast_max_concurrency.max(1) as usize;
        for batch in snapshot.chunks(batch_size) {
            let sends = batch
                .iter()
                .map(|connection_id| self.send_to_connection(connection_id, method_name, payload));
            join_all(sends).await;
        }
    }
}
