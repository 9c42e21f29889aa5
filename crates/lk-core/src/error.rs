//! Core error types for labkeeper

use std::path::PathBuf;
use thiserror::Error;

use crate::types::UserId;

/// Error returned by the session service
#[derive(Error, Debug)]
pub enum LkError {
    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Scheduling error
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors returned by the backend control plane.
///
/// Kept free of transport types so outcomes can be cloned into cleanup
/// reports and logged after the request is gone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never produced a response (DNS, connect, TLS, reset)
    #[error("Request failed: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// The backend answered with a status outside the success range
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Session and actor-state store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A session already exists for this user
    #[error("Session already exists for user {0}")]
    AlreadyExists(UserId),

    /// No session exists for this user
    #[error("Session not found for user {0}")]
    NotFound(UserId),

    /// Record (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by `schedule`/`cancel` to the request layer
#[derive(Error, Debug)]
pub enum ScheduleError {
    /// A required scheduling field is missing or empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A scheduling field has an invalid value
    #[error("Invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    /// The actor state could not be persisted
    #[error("Actor state error: {0}")]
    Store(#[from] StoreError),

    /// The actor task has stopped and no longer accepts commands
    #[error("Timer actor for {0} has stopped")]
    ActorStopped(UserId),
}

/// Why a cleanup attempt did not complete
#[derive(Error, Debug)]
pub enum CleanupError {
    /// At least one resource deletion failed
    #[error("{failed} of {total} resource deletions failed: {summary}")]
    ResourcesFailed {
        failed: usize,
        total: usize,
        summary: String,
    },

    /// Resources are gone but the session record could not be removed
    #[error("Session record removal failed: {0}")]
    Store(#[from] StoreError),
}
