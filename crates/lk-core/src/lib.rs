//! lk-core: Core abstractions and configuration for labkeeper
//!
//! This crate provides the shared domain types, error enums, traits and
//! configuration structures used by the backend gateway client and the
//! cleanup daemon.

pub mod config;
pub mod error;
pub mod ipc;
pub mod session;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{CleanupError, ConfigError, GatewayError, LkError, ScheduleError, StoreError};
pub use session::{ActorState, NewSession, Session, SessionUpdate};
pub use types::{ResourceId, UserId};
