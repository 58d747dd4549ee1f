//! In-memory per-session conversation store.
//!
//! Each session id maps to a conversation id and a bounded exchange history.
//! History holds only user/assistant turns (the system turn is rebuilt per
//! request) and is trimmed to the most recent N exchanges, oldest first, so
//! its length is always even and at most `2 * max_exchanges`.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::prompt::ConversationTurn;

#[derive(Debug, Clone)]
struct SessionState {
    conversation_id: String,
    history: Vec<ConversationTurn>,
}

#[derive(Debug)]
pub struct SessionStore {
    max_exchanges: usize,
    inner: RwLock<HashMap<String, SessionState>>,
}

impl SessionStore {
    pub fn new(max_exchanges: usize) -> Self {
        Self {
            max_exchanges,
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Current history for a session; empty for unknown sessions.
    pub async fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.inner
            .read()
            .await
            .get(session_id)
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// Conversation id for a session, if one exists.
    pub async fn conversation_id(&self, session_id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .get(session_id)
            .map(|s| s.conversation_id.clone())
    }

    /// Number of stored turns for a session.
    pub async fn message_count(&self, session_id: &str) -> usize {
        self.inner
            .read()
            .await
            .get(session_id)
            .map(|s| s.history.len())
            .unwrap_or(0)
    }

    /// Record one user/assistant exchange, trimming the oldest turns past the
    /// cap. Returns the session's conversation id, creating one when needed.
    pub async fn append_exchange(
        &self,
        session_id: &str,
        user_message: &str,
        assistant_message: &str,
    ) -> String {
        let mut inner = self.inner.write().await;
        let state = inner
            .entry(session_id.to_string())
            .or_insert_with(|| SessionState {
                conversation_id: new_conversation_id(),
                history: Vec::new(),
            });

        state.history.push(ConversationTurn::user(user_message));
        state
            .history
            .push(ConversationTurn::assistant(assistant_message));

        let cap = self.max_exchanges * 2;
        if state.history.len() > cap {
            let excess = state.history.len() - cap;
            state.history.drain(..excess);
        }

        state.conversation_id.clone()
    }

    /// Forget a session entirely (new-conversation endpoint).
    pub async fn clear(&self, session_id: &str) {
        self.inner.write().await.remove(session_id);
    }
}

fn new_conversation_id() -> String {
    format!("conv_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}
