//! In-memory stores

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use lk_core::error::StoreError;
use lk_core::session::{ActorState, Session, SessionUpdate};
use lk_core::traits::{SessionStore, StateStore};
use lk_core::types::UserId;

/// Session records held in a concurrent map
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<UserId, Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        match self.sessions.entry(session.user_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(session.user_id)),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.get(user_id).map(|s| s.value().clone()))
    }

    async fn update(
        &self,
        user_id: &UserId,
        update: &SessionUpdate,
        now_millis: u64,
    ) -> Result<Session, StoreError> {
        let mut session = self
            .sessions
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.clone()))?;
        session.apply(update, now_millis);
        Ok(session.clone())
    }

    async fn delete(&self, user_id: &UserId) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(user_id).is_some())
    }

    async fn list(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions: Vec<Session> = self.sessions.iter().map(|s| s.value().clone()).collect();
        sessions.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(sessions)
    }
}

/// Actor states held in a concurrent map
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: DashMap<UserId, ActorState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, user_id: &UserId) -> Result<Option<ActorState>, StoreError> {
        Ok(self.states.get(user_id).map(|s| s.value().clone()))
    }

    async fn save(&self, state: &ActorState) -> Result<(), StoreError> {
        self.states.insert(state.user_id.clone(), state.clone());
        Ok(())
    }

    async fn clear(&self, user_id: &UserId) -> Result<(), StoreError> {
        self.states.remove(user_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ActorState>, StoreError> {
        Ok(self.states.iter().map(|s| s.value().clone()).collect())
    }
}
