use anyhow::{Result, bail};
use crate::types::{ChatExchange, ChatSession};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory chat session storage
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, ChatSession>>>,
}

impl SessionStore {
    /// Create a new session store
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a session, replacing any session with the same id, and return its id.
    /// A session without an id is given a fresh one.
    pub async fn store(&self, mut session: ChatSession) -> String {
        if session.id.is_empty() {
            session.id = Uuid::new_v4().to_string();
        }
        let id = session.id.clone();
        self.sessions.write().await.insert(id.clone(), session);
        id
    }

    /// Retrieve a session by id
    pub async fn get(&self, id: &str) -> Option<ChatSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// All sessions, sorted by id
    pub async fn list(&self) -> Vec<ChatSession> {
        let mut sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        sessions
    }

    /// Append an exchange to an existing session
    pub async fn append_exchange(&self, id: &str, exchange: ChatExchange) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            bail!("unknown chat session `{id}`");
        };
        session.exchanges.push(exchange);
        Ok(session.exchanges.len())
    }

    /// Record the latest summary of an existing session
    pub async fn set_summary(&self, id: &str, summary: String) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(id) else {
            bail!("unknown chat session `{id}`");
        };
        session.summary = Some(summary);
        Ok(())
    }

    /// Remove a session, returning it if it existed
    pub async fn remove(&self, id: &str) -> Option<ChatSession> {
        self.sessions.write().await.remove(id)
    }

    /// Get the number of stored sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
