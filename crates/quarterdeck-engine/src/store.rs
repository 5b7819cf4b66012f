//! Concurrency-safe session map.
//!
//! Sessions are keyed by (operator, channel) and created lazily. Each
//! session carries its own mutex: the engine holds it for the full duration
//! of one event, including any network round trip, so a session processes
//! events strictly one at a time while distinct sessions stay independent.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use quarterdeck_core::session::Session;

/// Identity of one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub operator_id: i64,
    pub channel_id: i64,
}

impl SessionKey {
    pub fn new(operator_id: i64, channel_id: i64) -> Self {
        Self {
            operator_id,
            channel_id,
        }
    }
}

/// Shared map of live sessions.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for a key, creating a fresh root session on
    /// first contact.
    pub async fn get_or_create(&self, key: SessionKey) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().await.get(&key) {
            return session.clone();
        }
        let mut sessions = self.sessions.write().await;
        sessions.entry(key).or_default().clone()
    }

    /// Resets an existing session back to the root menu, if one exists.
    pub async fn reset(&self, key: &SessionKey) {
        if let Some(session) = self.sessions.read().await.get(key) {
            session.lock().await.reset_to_root();
        }
    }

    /// Drops a session entirely (operator removed from the allow-list,
    /// channel closed).
    pub async fn remove(&self, key: &SessionKey) {
        self.sessions.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
