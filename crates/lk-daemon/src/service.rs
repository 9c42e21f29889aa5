//! Session lifecycle operations used by the request layer

use std::sync::Arc;

use lk_core::error::LkError;
use lk_core::session::{ActorState, NewSession, Session, SessionUpdate};
use lk_core::time::Clock;
use lk_core::traits::SessionStore;
use lk_core::types::UserId;

use crate::actor::{ActorRegistry, ScheduleRequest};

/// A freshly created session and its cleanup alarm
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session: Session,
    /// Alarm instant, `None` if scheduling failed
    pub expires_at: Option<u64>,
}

/// Facade tying the session store to the timer actors
#[derive(Clone)]
pub struct LabSessions {
    sessions: Arc<dyn SessionStore>,
    actors: ActorRegistry,
    clock: Arc<dyn Clock>,
}

impl LabSessions {
    pub fn new(sessions: Arc<dyn SessionStore>, actors: ActorRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions,
            actors,
            clock,
        }
    }

    /// Timer actor registry
    pub fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    /// Store the session record and schedule its cleanup.
    ///
    /// Fails if the user already holds a session. A scheduling failure is
    /// logged and the session is still created, without an alarm.
    pub async fn create_session(&self, new: NewSession) -> Result<CreatedSession, LkError> {
        let session = Session::from_new(new, self.clock.now_millis());
        self.sessions.insert(session.clone()).await?;

        let request = ScheduleRequest {
            user_id: session.user_id.clone(),
            primary_resource_id: session.primary_resource_id.clone(),
            secondary_resource_ids: session.secondary_resource_ids.clone(),
            duration_minutes: session.duration_minutes,
        };
        let expires_at = match self.actors.schedule(request).await {
            Ok(alarm_at) => Some(alarm_at),
            Err(e) => {
                tracing::warn!(
                    "Session for {} created without scheduled cleanup: {}",
                    session.user_id,
                    e
                );
                None
            }
        };

        tracing::info!("Created session for {}", session.user_id);
        Ok(CreatedSession {
            session,
            expires_at,
        })
    }

    /// Get a user's session
    pub async fn get_session(&self, user_id: &UserId) -> Result<Option<Session>, LkError> {
        Ok(self.sessions.get(user_id).await?)
    }

    /// List all sessions, including ones whose cleanup keeps failing
    pub async fn list_sessions(&self) -> Result<Vec<Session>, LkError> {
        Ok(self.sessions.list().await?)
    }

    /// Update the stored duration.
    ///
    /// The pending alarm keeps its original instant.
    pub async fn update_session(
        &self,
        user_id: &UserId,
        update: SessionUpdate,
    ) -> Result<Session, LkError> {
        let session = self
            .sessions
            .update(user_id, &update, self.clock.now_millis())
            .await?;
        tracing::debug!(
            "Updated session for {} (duration {} minutes, alarm unchanged)",
            user_id,
            session.duration_minutes
        );
        Ok(session)
    }

    /// Cancel the user's cleanup and remove the session record.
    ///
    /// Backend resources are left to the caller. Returns whether anything
    /// existed.
    pub async fn delete_session(&self, user_id: &UserId) -> Result<bool, LkError> {
        let canceled = self.actors.cancel(user_id).await?;
        let removed = self.sessions.delete(user_id).await?;

        if removed || canceled.is_some() {
            tracing::info!("Deleted session for {}", user_id);
        }
        Ok(removed || canceled.is_some())
    }

    /// Timer state for a user, `None` when no cleanup is pending
    pub async fn actor_status(&self, user_id: &UserId) -> Result<Option<ActorState>, LkError> {
        Ok(self.actors.inspect(user_id).await?)
    }
}
