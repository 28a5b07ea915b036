use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{Session, SessionId};

/// Shared handle to one session. Holding the lock serializes that
/// session's turns without touching any other session.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Thread-safe in-memory session map.
/// Sessions live for the process lifetime unless explicitly reset.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, SessionHandle>,
}

impl SessionStore {
    pub fn new() -> Self {
        info!("Initializing session store");
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up `id`, creating a fresh session when it is absent or unknown.
    /// A missing or blank id gets a newly generated one.
    pub fn get_or_create(&self, id: Option<&str>) -> (SessionId, SessionHandle) {
        let id = match id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        let handle = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!("Creating session {}", id);
                Arc::new(Mutex::new(Session::new(id.clone())))
            })
            .clone();

        (id, handle)
    }

    /// Replace whatever lives under `id` with a fresh session.
    /// Holders of the old handle keep a detached copy nobody reads.
    pub fn reset(&self, id: &str) {
        let handle = Arc::new(Mutex::new(Session::new(id.to_string())));
        self.sessions.insert(id.to_string(), handle);
        info!("Session {} reset", id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
