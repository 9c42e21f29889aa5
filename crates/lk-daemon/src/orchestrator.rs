//! Cleanup orchestration
//!
//! One orchestration is a single end-to-end attempt at tearing down every
//! backend resource of a session:
//!
//! 1. The exposed services of the primary resource are deleted once. The
//!    outcome is logged and never affects the verdict.
//! 2. Every resource in the deduplicated set (primary first, then the
//!    secondaries in order) is deleted exactly once. A failure does not
//!    stop the remaining deletions.
//!
//! Retrying is left to the caller. Because every resource is attempted on
//! every run, a retry simply re-runs the whole set and relies on the
//! backend treating deletion of an already deleted lab as success.

use std::collections::HashSet;
use std::sync::Arc;

use lk_core::error::{CleanupError, GatewayError};
use lk_core::traits::{BackendGateway, DeleteAck, ServiceDeleteAck};
use lk_core::types::{ResourceId, UserId};

/// Outcome of deleting one resource
#[derive(Debug, Clone)]
pub struct ResourceResult {
    pub resource_id: ResourceId,
    pub result: Result<DeleteAck, GatewayError>,
}

/// Result of one orchestration attempt
#[derive(Debug, Clone)]
pub struct CleanupOutcome {
    /// Per-resource results in the order the requests were issued
    pub resource_results: Vec<ResourceResult>,
    /// Best-effort exposed-service deletion
    pub auxiliary_service_result: Result<ServiceDeleteAck, GatewayError>,
}

impl CleanupOutcome {
    /// True when every resource deletion succeeded.
    ///
    /// The auxiliary result is deliberately ignored.
    pub fn is_ok(&self) -> bool {
        self.resource_results.iter().all(|r| r.result.is_ok())
    }

    /// Resources whose deletion failed
    pub fn failures(&self) -> impl Iterator<Item = (&ResourceId, &GatewayError)> {
        self.resource_results
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (&r.resource_id, e)))
    }

    /// Collapse into a verdict
    pub fn into_result(self) -> Result<(), CleanupError> {
        let failed: Vec<String> = self
            .failures()
            .map(|(id, err)| format!("{}: {}", id, err))
            .collect();
        if failed.is_empty() {
            return Ok(());
        }

        Err(CleanupError::ResourcesFailed {
            failed: failed.len(),
            total: self.resource_results.len(),
            summary: failed.join("; "),
        })
    }
}

/// Primary first, then secondaries in order, without duplicates
pub fn dedup_resources(primary: &ResourceId, secondary: &[ResourceId]) -> Vec<ResourceId> {
    let mut seen = HashSet::with_capacity(secondary.len() + 1);
    std::iter::once(primary)
        .chain(secondary.iter())
        .filter(|&id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Drives teardown of a session's resources through the backend gateway
#[derive(Clone)]
pub struct CleanupOrchestrator {
    gateway: Arc<dyn BackendGateway>,
}

impl CleanupOrchestrator {
    /// Create an orchestrator over a gateway
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        Self { gateway }
    }

    /// Run one orchestration attempt
    pub async fn run(
        &self,
        user_id: &UserId,
        primary: &ResourceId,
        secondary: &[ResourceId],
    ) -> CleanupOutcome {
        let resources = dedup_resources(primary, secondary);

        let auxiliary_service_result = self.gateway.delete_exposed_services(primary).await;
        match &auxiliary_service_result {
            Ok(ack) => tracing::debug!(
                "Deleted exposed services for {} (status {})",
                primary,
                ack.status
            ),
            Err(e) => tracing::warn!(
                "Failed to delete exposed services for {}, continuing: {}",
                primary,
                e
            ),
        }

        let mut resource_results = Vec::with_capacity(resources.len());
        for resource_id in resources {
            let result = self.gateway.delete_resource(&resource_id, user_id).await;
            match &result {
                Ok(ack) if ack.is_async() => {
                    tracing::info!("Deletion of {} accepted by backend", resource_id)
                }
                Ok(_) => tracing::info!("Deleted resource {}", resource_id),
                Err(e) => tracing::warn!("Failed to delete resource {}: {}", resource_id, e),
            }
            resource_results.push(ResourceResult {
                resource_id,
                result,
            });
        }

        CleanupOutcome {
            resource_results,
            auxiliary_service_result,
        }
    }
}
