//! Conversation session store.
//!
//! Sessions live in memory only. The map is bounded: the least recently used
//! session is evicted once capacity is reached, and sessions idle for longer
//! than the TTL are treated as unknown and purged when next touched.

use std::convert::Infallible;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ForgeError, Result};
use crate::request::ConversationTurn;
use crate::{log_debug, log_info};

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_IDLE_TTL_MINUTES: i64 = 120;

/// Opaque, unguessable session token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl FromStr for SessionId {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

/// Storage for per-session conversation transcripts
pub trait SessionStore: Send + Sync {
    /// Open a new session with an empty history.
    fn create(&self) -> SessionId;

    /// Snapshot of the session's transcript in order.
    fn get(&self, id: &SessionId) -> Result<Vec<ConversationTurn>>;

    /// Append one turn.
    fn append(&self, id: &SessionId, turn: ConversationTurn) -> Result<()>;

    /// Append a user turn and its model reply as one step.
    fn append_exchange(
        &self,
        id: &SessionId,
        user: ConversationTurn,
        model: ConversationTurn,
    ) -> Result<()>;

    /// Discard a session.
    fn close(&self, id: &SessionId) -> Result<()>;

    /// Number of live sessions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct SessionEntry {
    turns: Vec<ConversationTurn>,
    last_activity: DateTime<Utc>,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            turns: Vec::new(),
            last_activity: Utc::now(),
        }
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_activity > ttl
    }

    fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Bounded in-memory [`SessionStore`]
pub struct InMemorySessionStore {
    sessions: Mutex<LruCache<SessionId, Arc<Mutex<SessionEntry>>>>,
    idle_ttl: Duration,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, Duration::minutes(DEFAULT_IDLE_TTL_MINUTES))
    }
}

impl fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySessionStore")
            .field("sessions", &self.len())
            .field("idle_ttl", &self.idle_ttl)
            .finish()
    }
}

impl InMemorySessionStore {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize, idle_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            idle_ttl,
        }
    }

    fn entry(&self, id: &SessionId) -> Result<Arc<Mutex<SessionEntry>>> {
        let mut sessions = self.sessions.lock();
        let entry = sessions
            .get(id)
            .cloned()
            .ok_or_else(|| ForgeError::UnknownSession(id.clone()))?;

        if entry.lock().is_expired(Utc::now(), self.idle_ttl) {
            sessions.pop(id);
            log_debug!("Session {} expired after idling", id);
            return Err(ForgeError::UnknownSession(id.clone()));
        }
        Ok(entry)
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self) -> SessionId {
        let id = SessionId::generate();
        let evicted = self
            .sessions
            .lock()
            .push(id.clone(), Arc::new(Mutex::new(SessionEntry::new())));
        if let Some((old, _)) = evicted {
            log_info!("Session capacity reached, evicted {}", old);
        }
        log_debug!("Opened session {}", id);
        id
    }

    fn get(&self, id: &SessionId) -> Result<Vec<ConversationTurn>> {
        let entry = self.entry(id)?;
        let mut entry = entry.lock();
        entry.touch();
        Ok(entry.turns.clone())
    }

    fn append(&self, id: &SessionId, turn: ConversationTurn) -> Result<()> {
        let entry = self.entry(id)?;
        let mut entry = entry.lock();
        entry.turns.push(turn);
        entry.touch();
        Ok(())
    }

    fn append_exchange(
        &self,
        id: &SessionId,
        user: ConversationTurn,
        model: ConversationTurn,
    ) -> Result<()> {
        let entry = self.entry(id)?;
        let mut entry = entry.lock();
        entry.turns.push(user);
        entry.turns.push(model);
        entry.touch();
        Ok(())
    }

    fn close(&self, id: &SessionId) -> Result<()> {
        self.sessions
            .lock()
            .pop(id)
            .map(|_| log_debug!("Closed session {}", id))
            .ok_or_else(|| ForgeError::UnknownSession(id.clone()))
    }

    fn len(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Role;

    #[test]
    fn test_new_session_is_empty_and_ids_are_distinct() {
        let store = InMemorySessionStore::default();
        let a = store.create();
        let b = store.create();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(store.get(&a).expect("known").is_empty());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_exchange_keeps_alternation() {
        let store = InMemorySessionStore::default();
        let id = store.create();
        store
            .append_exchange(&id, ConversationTurn::user("q1"), ConversationTurn::model("a1"))
            .expect("append");
        store
            .append_exchange(&id, ConversationTurn::user("q2"), ConversationTurn::model("a2"))
            .expect("append");

        let roles: Vec<Role> = store.get(&id).expect("known").iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Model, Role::User, Role::Model]);
    }

    #[test]
    fn test_unknown_and_closed_sessions_are_rejected() {
        let store = InMemorySessionStore::default();
        let bogus = SessionId::from("nope".to_string());
        assert!(matches!(store.get(&bogus), Err(ForgeError::UnknownSession(_))));
        assert!(matches!(
            store.append(&bogus, ConversationTurn::user("x")),
            Err(ForgeError::UnknownSession(_))
        ));

        let id = store.create();
        store.close(&id).expect("close");
        assert!(matches!(store.get(&id), Err(ForgeError::UnknownSession(_))));
        assert!(matches!(store.close(&id), Err(ForgeError::UnknownSession(_))));
    }

    #[test]
    fn test_least_recently_used_session_is_evicted() {
        let store = InMemorySessionStore::new(2, Duration::minutes(5));
        let first = store.create();
        let second = store.create();
        store.get(&first).expect("touch first");
        let third = store.create();

        assert!(store.get(&first).is_ok());
        assert!(matches!(store.get(&second), Err(ForgeError::UnknownSession(_))));
        assert!(store.get(&third).is_ok());
    }

    #[test]
    fn test_idle_sessions_expire() {
        let store = InMemorySessionStore::new(8, Duration::milliseconds(5));
        let id = store.create();
        std::thread::sleep(std::time::Duration::from_millis(30));

        assert!(matches!(store.get(&id), Err(ForgeError::UnknownSession(_))));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_concurrent_sessions_do_not_interfere() {
        let store = Arc::new(InMemorySessionStore::default());
        let ids: Vec<SessionId> = (0..8).map(|_| store.create()).collect();

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store
                            .append_exchange(
                                &id,
                                ConversationTurn::user(format!("{id}-q{i}")),
                                ConversationTurn::model(format!("{id}-a{i}")),
                            )
                            .expect("append");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }

        for id in &ids {
            let turns = store.get(id).expect("known");
            assert_eq!(turns.len(), 100);
            assert!(turns.iter().all(|t| t.text().starts_with(id.as_str())));
            assert!(turns.chunks(2).all(|pair| pair[0].role == Role::User && pair[1].role == Role::Model));
        }
    }
}
