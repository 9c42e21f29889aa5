//! Session records and per-user actor state

use serde::{Deserialize, Serialize};

use crate::types::{ActorPhase, ResourceId, UserId};

/// Milliseconds in one minute
pub const MILLIS_PER_MINUTE: u64 = 60_000;

/// A leased lab session as persisted by the session store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Owner of the lease, unique across active sessions
    pub user_id: UserId,
    /// Main allocation (master VM)
    pub primary_resource_id: ResourceId,
    /// Extra allocations such as worker nodes, in creation order
    #[serde(default)]
    pub secondary_resource_ids: Vec<ResourceId>,
    /// Lease length in minutes
    pub duration_minutes: u32,
    /// Creation time (unix millis)
    pub created_at: u64,
    /// Last update time (unix millis)
    pub updated_at: u64,
}

impl Session {
    /// Build a session record from a creation payload
    pub fn from_new(new: NewSession, now_millis: u64) -> Self {
        Self {
            user_id: new.user_id,
            primary_resource_id: new.primary_resource_id,
            secondary_resource_ids: new.secondary_resource_ids,
            duration_minutes: new.duration_minutes,
            created_at: now_millis,
            updated_at: now_millis,
        }
    }

    /// Apply an update in place
    pub fn apply(&mut self, update: &SessionUpdate, now_millis: u64) {
        if let Some(duration) = update.duration_minutes {
            self.duration_minutes = duration;
        }
        self.updated_at = now_millis;
    }

    /// Instant the lease is due to expire according to the stored duration.
    ///
    /// This follows the record, not the timer: after an update of
    /// `duration_minutes` the two can disagree.
    pub fn expires_at(&self) -> u64 {
        self.created_at
            .saturating_add(u64::from(self.duration_minutes) * MILLIS_PER_MINUTE)
    }
}

/// Payload for creating a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub user_id: UserId,
    pub primary_resource_id: ResourceId,
    #[serde(default)]
    pub secondary_resource_ids: Vec<ResourceId>,
    pub duration_minutes: u32,
}

/// Mutable fields of a session record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    /// New lease length. Stored only; the pending alarm is left as is.
    pub duration_minutes: Option<u32>,
}

/// Durable control-plane record owned by one user's timer actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorState {
    pub user_id: UserId,
    pub primary_resource_id: ResourceId,
    #[serde(default)]
    pub secondary_resource_ids: Vec<ResourceId>,
    pub duration_minutes: u32,
    /// When `schedule` was accepted (unix millis)
    pub created_at: u64,
    /// The single pending wake-up instant (unix millis)
    pub alarm_at: Option<u64>,
    /// Failed cleanup attempts since scheduling
    #[serde(default)]
    pub attempts: u32,
    /// Diagnostic text of the most recent failed attempt
    #[serde(default)]
    pub last_error: Option<String>,
    /// Retries ran out; the state is kept but no alarm is armed
    #[serde(default)]
    pub exhausted: bool,
    /// Cleanup finished but the state could not be removed. Such a state
    /// is discarded on load and never re-armed.
    #[serde(default)]
    pub completed: bool,
}

impl ActorState {
    /// Phase implied by the persisted fields
    pub fn phase(&self) -> ActorPhase {
        match self.alarm_at {
            Some(_) => ActorPhase::Scheduled,
            None if self.exhausted => ActorPhase::Exhausted,
            // The alarm is cleared just before a cleanup attempt starts
            None => ActorPhase::Firing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session() -> NewSession {
        NewSession {
            user_id: UserId::new("u1"),
            primary_resource_id: ResourceId::new("p1"),
            secondary_resource_ids: vec![],
            duration_minutes: 30,
        }
    }

    #[test]
    fn test_session_expires_at() {
        let session = Session::from_new(new_session(), 1_000);
        assert_eq!(session.expires_at(), 1_000 + 30 * 60_000);
        assert_eq!(session.updated_at, session.created_at);
    }

    #[test]
    fn test_apply_update_changes_duration_only() {
        let mut session = Session::from_new(new_session(), 1_000);
        session.apply(
            &SessionUpdate {
                duration_minutes: Some(90),
            },
            5_000,
        );
        assert_eq!(session.duration_minutes, 90);
        assert_eq!(session.created_at, 1_000);
        assert_eq!(session.updated_at, 5_000);
        assert_eq!(session.primary_resource_id, ResourceId::new("p1"));
    }

    #[test]
    fn test_secondary_ids_default_to_empty() {
        let json = r#"{"user_id":"u1","primary_resource_id":"p1","duration_minutes":5}"#;
        let new: NewSession = serde_json::from_str(json).unwrap();
        assert!(new.secondary_resource_ids.is_empty());
    }

    #[test]
    fn test_completed_defaults_to_false() {
        let json = r#"{"user_id":"u1","primary_resource_id":"p1","duration_minutes":1,"created_at":0,"alarm_at":null}"#;
        let state: ActorState = serde_json::from_str(json).unwrap();
        assert!(!state.completed);
        assert!(!state.exhausted);
    }

    #[test]
    fn test_actor_state_phase() {
        let mut state = ActorState {
            user_id: UserId::new("u1"),
            primary_resource_id: ResourceId::new("p1"),
            secondary_resource_ids: vec![],
            duration_minutes: 1,
            created_at: 0,
            alarm_at: Some(60_000),
            attempts: 0,
            last_error: None,
            exhausted: false,
            completed: false,
        };
        assert_eq!(state.phase(), ActorPhase::Scheduled);

        state.alarm_at = None;
        state.attempts = 2;
        assert_eq!(state.phase(), ActorPhase::Firing);

        state.exhausted = true;
        assert_eq!(state.phase(), ActorPhase::Exhausted);
    }
}
