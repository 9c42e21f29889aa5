//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of the user a lab session is leased to.
///
/// A user holds at most one active session, so this doubles as the key
/// of both the session record and the per-user timer actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Create a new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ID is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// File-system safe form of the ID, used as a record file stem.
    ///
    /// Alphanumerics, `-` and `_` pass through; every other byte is
    /// hex-escaped as `%XX` so distinct IDs never collide. The empty ID
    /// maps to a lone `%`, which no escaped ID can produce.
    pub fn file_stem(&self) -> String {
        if self.0.is_empty() {
            return "%".to_string();
        }
        let mut out = String::with_capacity(self.0.len());
        for b in self.0.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{:02X}", b));
            }
        }
        out
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a backend allocation (a VM or lab request handle)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    /// Create a new resource ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the ID is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle phase of a per-user timer actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorPhase {
    /// No session state held
    Idle,
    /// An alarm is pending
    Scheduled,
    /// A cleanup attempt is in progress
    Firing,
    /// Retries were exhausted; state is kept but no alarm is armed
    Exhausted,
}

impl fmt::Display for ActorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorPhase::Idle => write!(f, "idle"),
            ActorPhase::Scheduled => write!(f, "scheduled"),
            ActorPhase::Firing => write!(f, "firing"),
            ActorPhase::Exhausted => write!(f, "exhausted"),
        }
    }
}
