//! Session registry.
//!
//! Maps session ids to live SSE transports. Entries are weak: the response
//! stream owns the transport, the registry only finds it. Every operation
//! takes the lock once, so operations are atomic with respect to each other.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use super::sse::SseTransport;
use super::Transport;

/// Registry of open SSE sessions.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Weak<SseTransport>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport under its session id.
    ///
    /// Returns false, leaving the existing entry alone, if the id is taken.
    pub fn insert(&self, transport: &Arc<SseTransport>) -> bool {
        let id = transport.id().to_string();
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&id) {
            warn!(session_id = %id, "Session already registered");
            return false;
        }
        sessions.insert(id.clone(), Arc::downgrade(transport));
        info!(session_id = %id, "Registered SSE session");
        true
    }

    /// Find the live transport for a session id.
    pub fn lookup(&self, id: &str) -> Option<Arc<SseTransport>> {
        self.sessions.read().get(id).and_then(Weak::upgrade)
    }

    /// Deregister a session. Returns whether an entry was removed.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id).is_some();
        if removed {
            info!(session_id = %id, "Removed SSE session");
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Close every registered session and clear the map.
    ///
    /// Failures are logged and skipped. Returns how many sessions were closed.
    pub async fn close_all(&self) -> usize {
        let snapshot: Vec<(String, Weak<SseTransport>)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, transport)| (id.clone(), transport.clone()))
            .collect();

        info!("Closing {} SSE session(s)", snapshot.len());

        let mut closed = 0;
        for (id, transport) in snapshot {
            match transport.upgrade() {
                Some(transport) => match transport.close().await {
                    Ok(()) => closed += 1,
                    Err(e) => warn!(session_id = %id, "Failed to close session: {}", e),
                },
                None => debug!(session_id = %id, "Session already dropped"),
            }
            // Normally done by the close handler; covers transports without one.
            self.remove(&id);
        }

        closed
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::sse::SseStream;

    fn registered(registry: &SessionRegistry) -> (Arc<SseTransport>, SseStream) {
        let (transport, stream) = SseTransport::new("/messages");
        assert!(registry.insert(&transport));
        let id = transport.id().to_string();
        let handle = registry.clone();
        transport.set_close_handler(Arc::new(move || {
            handle.remove(&id);
        }));
        (transport, stream)
    }

    #[test]
    fn test_insert_lookup_remove() {
        let registry = SessionRegistry::new();
        let (transport, _stream) = SseTransport::new("/messages");

        assert!(registry.insert(&transport));
        assert!(!registry.insert(&transport));
        assert_eq!(registry.len(), 1);

        let found = registry.lookup(transport.id()).unwrap();
        assert!(Arc::ptr_eq(&found, &transport));

        assert!(registry.remove(transport.id()));
        assert!(!registry.remove(transport.id()));
        assert!(registry.lookup(transport.id()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = SessionRegistry::new();
        assert!(registry.lookup("nope").is_none());
    }

    #[test]
    fn test_entries_do_not_own_transports() {
        let registry = SessionRegistry::new();
        let (transport, stream) = SseTransport::new("/messages");
        let id = transport.id().to_string();
        registry.insert(&transport);

        drop(stream);
        drop(transport);

        assert!(registry.lookup(&id).is_none());
    }

    #[tokio::test]
    async fn test_close_deregisters() {
        let registry = SessionRegistry::new();
        let (transport, _stream) = registered(&registry);
        transport.start().await.unwrap();

        transport.close().await.unwrap();

        assert!(registry.lookup(transport.id()).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = SessionRegistry::new();
        let sessions: Vec<_> = (0..3).map(|_| registered(&registry)).collect();
        for (transport, _) in &sessions {
            transport.start().await.unwrap();
        }
        assert_eq!(registry.len(), 3);

        assert_eq!(registry.close_all().await, 3);

        assert!(registry.is_empty());
        for (transport, _) in &sessions {
            assert!(!transport.is_connected());
        }
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = SessionRegistry::new();
        let mut tasks = Vec::new();
        for _ in 0..50 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let (transport, stream) = registered(&registry);
                transport.start().await.unwrap();
                assert!(registry.lookup(transport.id()).is_some());
                drop(stream);
                assert!(registry.lookup(transport.id()).is_none());
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(registry.is_empty());
    }
}
