//! Connection registry: the authority for online presence in this process.
//!
//! Two maps behind one mutex. Critical sections cover map lookups and
//! mutations plus the displaced-connection close; nothing in here awaits,
//! and no frame is ever enqueued while the lock is held.

use super::connection::{Connection, SendError};
use protocol::CommandId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection not found")]
    ConnectionNotFound,
}

#[derive(Default)]
struct Inner {
    /// connID -> Connection
    connections: HashMap<String, Arc<Connection>>,
    /// userID -> connID; at most one entry per user
    user_conns: HashMap<String, String>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, conn: Arc<Connection>) {
        let mut inner = self.lock();
        info!(conn_id = %conn.id(), "connection added");
        inner.connections.insert(conn.id().to_string(), conn);
    }

    /// Drop a connection from both maps. No-op when absent. The user binding
    /// is only removed when it still points at this connection, so a
    /// displaced peer disconnecting late cannot unbind its successor.
    pub fn remove(&self, conn_id: &str) {
        let mut inner = self.lock();
        let Some(conn) = inner.connections.remove(conn_id) else {
            return;
        };
        if let Some(user_id) = conn.user_id() {
            if inner.user_conns.get(&user_id).map(String::as_str) == Some(conn_id) {
                inner.user_conns.remove(&user_id);
            }
            info!(conn_id = %conn_id, user_id = %user_id, "connection removed");
        } else {
            info!(conn_id = %conn_id, "connection removed");
        }
    }

    pub fn get(&self, conn_id: &str) -> Option<Arc<Connection>> {
        self.lock().connections.get(conn_id).cloned()
    }

    /// Bind a user to a connection, displacing any existing binding: the old
    /// connection is closed and removed inside the same critical section, so
    /// two concurrent logins can never double-bind. Returns the displaced
    /// connection, already unreachable and closed.
    pub fn bind_user(
        &self,
        conn_id: &str,
        user_id: &str,
    ) -> Result<Option<Arc<Connection>>, RegistryError> {
        let mut inner = self.lock();

        let conn = inner
            .connections
            .get(conn_id)
            .cloned()
            .ok_or(RegistryError::ConnectionNotFound)?;

        let mut displaced = None;
        if let Some(old_conn_id) = inner.user_conns.get(user_id).cloned() {
            if old_conn_id != conn_id {
                if let Some(old) = inner.connections.remove(&old_conn_id) {
                    info!(user_id = %user_id, old_conn_id = %old_conn_id, "displacing old session");
                    old.close();
                    displaced = Some(old);
                }
            }
        }

        conn.set_user_id(user_id);
        inner
            .user_conns
            .insert(user_id.to_string(), conn_id.to_string());

        info!(user_id = %user_id, conn_id = %conn_id, "user bound to connection");
        Ok(displaced)
    }

    pub fn get_by_user(&self, user_id: &str) -> Option<Arc<Connection>> {
        let inner = self.lock();
        let conn_id = inner.user_conns.get(user_id)?;
        inner.connections.get(conn_id).cloned()
    }

    /// Lookup under the lock, enqueue outside it.
    pub fn send_to_user(
        &self,
        user_id: &str,
        command: CommandId,
        sequence: u32,
        body: &[u8],
    ) -> Result<(), SendError> {
        let conn = self.get_by_user(user_id).ok_or(SendError::Offline)?;
        conn.send_frame(command, sequence, body)
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.get_by_user(user_id)
            .map(|conn| conn.alive())
            .unwrap_or(false)
    }

    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    pub fn online_user_count(&self) -> usize {
        self.lock().user_conns.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::connection::TransportKind;

    fn add_conn(registry: &ConnectionRegistry, id: &str) -> Arc<Connection> {
        let (conn, _rx) = Connection::new(id.to_string(), TransportKind::Tcp);
        registry.add(conn.clone());
        conn
    }

    #[tokio::test]
    async fn bind_then_lookup_by_user() {
        let registry = ConnectionRegistry::new();
        let conn = add_conn(&registry, "x");

        registry.bind_user("x", "bob").unwrap();
        let found = registry.get_by_user("bob").unwrap();
        assert_eq!(found.id(), conn.id());
        assert!(registry.is_online("bob"));
        assert_eq!(registry.online_user_count(), 1);
        assert!(registry.get("x").is_some());
        assert!(registry.get("ghost").is_none());
    }

    #[tokio::test]
    async fn rebinding_displaces_the_old_session() {
        let registry = ConnectionRegistry::new();
        let old = add_conn(&registry, "x");
        let _new = add_conn(&registry, "y");

        registry.bind_user("x", "bob").unwrap();
        let displaced = registry.bind_user("y", "bob").unwrap().unwrap();

        assert_eq!(displaced.id(), "x");
        assert!(!old.alive());
        assert!(old.is_closed());
        assert_eq!(registry.get_by_user("bob").unwrap().id(), "y");
        // one binding, one surviving connection
        assert_eq!(registry.online_user_count(), 1);
        assert_eq!(registry.connection_count(), 1);
    }

    #[tokio::test]
    async fn rebinding_the_same_connection_is_a_noop() {
        let registry = ConnectionRegistry::new();
        add_conn(&registry, "x");

        registry.bind_user("x", "bob").unwrap();
        let displaced = registry.bind_user("x", "bob").unwrap();
        assert!(displaced.is_none());
        assert_eq!(registry.connection_count(), 1);
    }

    #[tokio::test]
    async fn bind_unknown_connection_fails() {
        let registry = ConnectionRegistry::new();
        assert_eq!(
            registry.bind_user("ghost", "bob").unwrap_err(),
            RegistryError::ConnectionNotFound
        );
    }

    #[tokio::test]
    async fn stale_remove_does_not_unbind_the_successor() {
        let registry = ConnectionRegistry::new();
        add_conn(&registry, "x");
        add_conn(&registry, "y");

        registry.bind_user("x", "bob").unwrap();
        registry.bind_user("y", "bob").unwrap();
        // the displaced reader loop exits late and removes its own conn
        registry.remove("x");

        assert_eq!(registry.get_by_user("bob").unwrap().id(), "y");
    }

    #[tokio::test]
    async fn remove_clears_both_maps() {
        let registry = ConnectionRegistry::new();
        add_conn(&registry, "x");
        registry.bind_user("x", "bob").unwrap();

        registry.remove("x");
        assert!(registry.get_by_user("bob").is_none());
        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.online_user_count(), 0);
        // removing twice is fine
        registry.remove("x");
    }

    #[tokio::test]
    async fn send_to_offline_user_reports_offline() {
        let registry = ConnectionRegistry::new();
        assert_eq!(
            registry.send_to_user("nobody", CommandId::PushMsg, 0, b""),
            Err(SendError::Offline)
        );
    }
}
