//! IPC protocol for operator tooling to daemon communication
//!
//! Uses newline-delimited JSON messages over TCP on localhost (127.0.0.1).

use serde::{Deserialize, Serialize};

use crate::session::{ActorState, Session};
use crate::types::ActorPhase;

/// IPC request from an operator client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcRequest {
    /// Get daemon status
    GetStatus,

    /// Create a session and schedule its cleanup
    CreateSession {
        user_id: String,
        primary_resource_id: String,
        #[serde(default)]
        secondary_resource_ids: Vec<String>,
        duration_minutes: u32,
    },

    /// Get the session for a user
    GetSession { user_id: String },

    /// List all sessions
    ListSessions,

    /// Change the stored duration of a session
    UpdateSession {
        user_id: String,
        duration_minutes: u32,
    },

    /// Delete a session and cancel its timer
    DeleteSession { user_id: String },

    /// Inspect a user's timer actor
    GetActor { user_id: String },

    /// Ping (for keepalive)
    Ping,

    /// Shutdown the daemon
    Shutdown,
}

/// IPC response from the daemon to a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcResponse {
    /// Daemon status
    Status(DaemonStatus),

    /// Session created
    SessionCreated {
        session: SessionInfo,
        /// Cleanup instant, absent if scheduling failed
        expires_at: Option<u64>,
    },

    /// Single session
    Session(SessionInfo),

    /// List of sessions
    Sessions { sessions: Vec<SessionInfo> },

    /// Timer actor details
    Actor(ActorInfo),

    /// Generic success
    Ok,

    /// Error response
    Error { message: String },

    /// Pong response
    Pong,
}

/// Daemon status information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStatus {
    /// Whether the daemon is running
    pub running: bool,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Number of stored sessions
    pub session_count: usize,
    /// Number of live timer actors
    pub actor_count: usize,
    /// Daemon version
    pub version: String,
}

/// Session information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: String,
    pub primary_resource_id: String,
    pub secondary_resource_ids: Vec<String>,
    pub duration_minutes: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.to_string(),
            primary_resource_id: session.primary_resource_id.to_string(),
            secondary_resource_ids: session
                .secondary_resource_ids
                .iter()
                .map(|id| id.to_string())
                .collect(),
            duration_minutes: session.duration_minutes,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// Timer actor information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorInfo {
    pub user_id: String,
    pub phase: ActorPhase,
    pub alarm_at: Option<u64>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl ActorInfo {
    /// Info for a user without any actor state
    pub fn idle(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            phase: ActorPhase::Idle,
            alarm_at: None,
            attempts: 0,
            last_error: None,
        }
    }
}

impl From<&ActorState> for ActorInfo {
    fn from(state: &ActorState) -> Self {
        Self {
            user_id: state.user_id.to_string(),
            phase: state.phase(),
            alarm_at: state.alarm_at,
            attempts: state.attempts,
            last_error: state.last_error.clone(),
        }
    }
}
