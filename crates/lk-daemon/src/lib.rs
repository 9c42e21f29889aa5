//! lk-daemon: Lab session expiry and cleanup daemon
//!
//! Every active lab session owns a timer actor keyed by its user. When the
//! lease runs out the actor drives the cleanup orchestrator, which tears
//! down the session's backend resources, then removes the session record.
//! Failed cleanups are re-armed and retried until they succeed.

pub mod actor;
pub mod ipc;
pub mod orchestrator;
pub mod service;
pub mod state;
pub mod store;

pub use actor::{ActorRegistry, FireReport, ScheduleRequest};
pub use orchestrator::{CleanupOrchestrator, CleanupOutcome};
pub use service::{CreatedSession, LabSessions};
pub use state::DaemonState;
