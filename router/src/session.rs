use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::handler::SessionSnapshot;
use crate::observation::ObservationContext;

/// One logged query turn.
#[derive(Debug, Clone)]
pub struct QueryLogEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<Map<String, Value>>,
}

/// Mutable per-user state: the capped query log, the merged metadata
/// map, and one observation context per handler. Only touched while
/// holding the user's lock from `SessionStore`.
#[derive(Debug, Default)]
pub struct UserSession {
    pub queries: VecDeque<QueryLogEntry>,
    pub metadata: Map<String, Value>,
    /// handler name -> that handler's observation context
    pub contexts: HashMap<String, ObservationContext>,
}

impl UserSession {
    /// Append a query turn, dropping the oldest entries past `cap`.
    pub fn record_query(
        &mut self,
        query: &str,
        metadata: Option<&Map<String, Value>>,
        now: DateTime<Utc>,
        cap: usize,
    ) {
        self.queries.push_back(QueryLogEntry {
            query: query.to_string(),
            timestamp: now,
            metadata: metadata.cloned(),
        });
        while self.queries.len() > cap {
            self.queries.pop_front();
        }
    }

    /// Merge metadata, last write wins per key.
    pub fn merge_metadata(&mut self, metadata: &Map<String, Value>) {
        for (key, value) in metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    /// Clone out a read-only view for handler calls. Context order is
    /// by handler name so handlers see a stable list.
    pub fn snapshot(&self, user_id: &str) -> SessionSnapshot {
        let mut contexts: Vec<ObservationContext> = self.contexts.values().cloned().collect();
        contexts.sort_by(|a, b| a.handler.cmp(&b.handler));
        SessionSnapshot {
            user_id: user_id.to_string(),
            recent_queries: self.queries.iter().map(|q| q.query.clone()).collect(),
            metadata: self.metadata.clone(),
            contexts,
        }
    }
}

/// Sessions keyed by user id, created lazily, destroyed only by an
/// explicit clear. The per-user `Mutex` is the single-writer-at-a-time
/// discipline: the router holds a user's lock across a whole
/// `route_query`, so same-user calls serialize while different users
/// proceed independently.
#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, Arc<Mutex<UserSession>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user's session cell, created on first touch.
    pub async fn session(&self, user_id: &str) -> Arc<Mutex<UserSession>> {
        if let Some(session) = self.inner.read().await.get(user_id) {
            return session.clone();
        }
        let mut map = self.inner.write().await;
        map.entry(user_id.to_string()).or_default().clone()
    }

    /// Drop the user's session entirely. Returns whether one existed.
    pub async fn clear(&self, user_id: &str) -> bool {
        self.inner.write().await.remove(user_id).is_some()
    }

    /// Session cell if the user has one, without creating it.
    pub async fn existing(&self, user_id: &str) -> Option<Arc<Mutex<UserSession>>> {
        self.inner.read().await.get(user_id).cloned()
    }
}
