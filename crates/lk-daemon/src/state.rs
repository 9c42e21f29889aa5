//! Global daemon state

use std::time::Instant;

use lk_core::config::DaemonConfig;

use crate::actor::ActorRegistry;
use crate::service::LabSessions;

/// Global state for the cleanup daemon
pub struct DaemonState {
    /// Configuration
    pub config: DaemonConfig,
    /// Session lifecycle facade
    pub sessions: LabSessions,
    /// When the daemon started
    pub start_time: Instant,
}

impl DaemonState {
    /// Create new daemon state
    pub fn new(config: DaemonConfig, sessions: LabSessions) -> Self {
        Self {
            config,
            sessions,
            start_time: Instant::now(),
        }
    }

    /// Get the timer actor registry
    pub fn actors(&self) -> &ActorRegistry {
        self.sessions.actors()
    }

    /// Seconds since the daemon started
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
