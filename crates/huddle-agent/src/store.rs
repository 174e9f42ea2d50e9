//! Conversation persistence contract

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::conversation::ConversationState;
use crate::error::Result;

/// Loads and saves [`ConversationState`] by identity
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch the state for `identity`, creating a fresh Idle one if none exists
    async fn get_or_create(&self, identity: &str, now: DateTime<Utc>) -> Result<ConversationState>;

    async fn save(&self, state: &ConversationState) -> Result<()>;
}

/// HashMap-backed store
#[derive(Default)]
pub struct InMemoryConversationStore {
    states: Mutex<HashMap<String, ConversationState>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a stored state without creating one
    pub fn get(&self, identity: &str) -> Option<ConversationState> {
        self.states.lock().get(identity).cloned()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_or_create(&self, identity: &str, now: DateTime<Utc>) -> Result<ConversationState> {
        Ok(self
            .states
            .lock()
            .entry(identity.to_string())
            .or_insert_with(|| ConversationState::new(identity, now))
            .clone())
    }

    async fn save(&self, state: &ConversationState) -> Result<()> {
        self.states
            .lock()
            .insert(state.identity.clone(), state.clone());
        Ok(())
    }
}
