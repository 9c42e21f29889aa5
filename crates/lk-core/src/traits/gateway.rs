//! Backend control plane abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::types::{ResourceId, UserId};

/// HTTP status the backend uses for "accepted, deleting asynchronously"
pub const STATUS_ACCEPTED: u16 = 202;

/// Successful resource deletion response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAck {
    /// HTTP status, always in the 2xx range
    pub status: u16,
}

impl DeleteAck {
    /// Whether the backend only queued the deletion
    pub fn is_async(&self) -> bool {
        self.status == STATUS_ACCEPTED
    }
}

/// Successful exposed-service deletion response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDeleteAck {
    /// HTTP status, always in the 2xx range
    pub status: u16,
    /// Raw response body, kept for diagnostics
    pub body: String,
}

/// Remote operations against the lab backend.
///
/// Implementations perform exactly one request per call; retrying is the
/// caller's policy.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Remove the network services exposed for a lab.
    ///
    /// Best-effort: callers log failures and carry on.
    async fn delete_exposed_services(
        &self,
        primary_resource_id: &ResourceId,
    ) -> Result<ServiceDeleteAck, GatewayError>;

    /// Delete one VM allocation owned by `user_id`
    async fn delete_resource(
        &self,
        resource_id: &ResourceId,
        user_id: &UserId,
    ) -> Result<DeleteAck, GatewayError>;
}
