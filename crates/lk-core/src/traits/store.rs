//! Persistence traits

use async_trait::async_trait;

use crate::error::StoreError;
use crate::session::{ActorState, Session, SessionUpdate};
use crate::types::UserId;

/// Session records keyed by user.
///
/// Only point operations by user ID exist; there are no cross-user
/// transactions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session, failing with `AlreadyExists` if the user
    /// already holds one. The existing record is left untouched.
    async fn insert(&self, session: Session) -> Result<(), StoreError>;

    /// Get the session for a user
    async fn get(&self, user_id: &UserId) -> Result<Option<Session>, StoreError>;

    /// Apply an update, failing with `NotFound` if there is no session
    async fn update(
        &self,
        user_id: &UserId,
        update: &SessionUpdate,
        now_millis: u64,
    ) -> Result<Session, StoreError>;

    /// Remove the session for a user.
    ///
    /// Returns whether a record existed. Removing a missing record is not
    /// an error.
    async fn delete(&self, user_id: &UserId) -> Result<bool, StoreError>;

    /// List all sessions
    async fn list(&self) -> Result<Vec<Session>, StoreError>;
}

/// Durable per-user timer actor state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the state for a user
    async fn load(&self, user_id: &UserId) -> Result<Option<ActorState>, StoreError>;

    /// Replace the state for `state.user_id`
    async fn save(&self, state: &ActorState) -> Result<(), StoreError>;

    /// Remove all state for a user; a no-op if none exists
    async fn clear(&self, user_id: &UserId) -> Result<(), StoreError>;

    /// List every persisted state, used to re-arm alarms at startup
    async fn list(&self) -> Result<Vec<ActorState>, StoreError>;
}
