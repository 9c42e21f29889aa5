//! Backend control plane client

use async_trait::async_trait;
use serde::Serialize;

use lk_core::config::BackendConfig;
use lk_core::error::{ConfigError, GatewayError};
use lk_core::traits::{BackendGateway, DeleteAck, ServiceDeleteAck};
use lk_core::types::{ResourceId, UserId};

/// Path of the exposed-service deletion endpoint
pub const EXPOSE_PATH: &str = "/api/v1/expose/";

/// Path of the lab deletion endpoint
pub const LAB_DELETE_PATH: &str = "/api/v1/labs/delete";

#[derive(Serialize)]
struct ExposeDeleteRequest<'a> {
    lab_request_id: &'a str,
}

#[derive(Serialize)]
struct LabDeleteRequest<'a> {
    lab_request_id: &'a str,
    user_id: &'a str,
}

/// `reqwest` implementation of [`BackendGateway`].
///
/// Construction fails when the backend URL or token is missing, so a
/// misconfigured daemon stops before it would issue any request.
#[derive(Debug, Clone)]
pub struct HttpBackendGateway {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpBackendGateway {
    /// Create a client from backend configuration
    pub fn from_config(config: &BackendConfig) -> Result<Self, ConfigError> {
        let base_url = config.require_url()?.to_string();
        let token = config.require_token()?.to_string();

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

/// Split a response into its status and body text.
async fn read_response(response: reqwest::Response) -> (reqwest::StatusCode, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

#[async_trait]
impl BackendGateway for HttpBackendGateway {
    async fn delete_exposed_services(
        &self,
        primary_resource_id: &ResourceId,
    ) -> Result<ServiceDeleteAck, GatewayError> {
        let url = self.url(EXPOSE_PATH);
        tracing::debug!(url = %url, lab_request_id = %primary_resource_id, "Deleting exposed services");

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .json(&ExposeDeleteRequest {
                lab_request_id: primary_resource_id.as_str(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        let (status, body) = read_response(response).await;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(ServiceDeleteAck {
            status: status.as_u16(),
            body,
        })
    }

    async fn delete_resource(
        &self,
        resource_id: &ResourceId,
        user_id: &UserId,
    ) -> Result<DeleteAck, GatewayError> {
        let url = self.url(LAB_DELETE_PATH);
        tracing::debug!(url = %url, lab_request_id = %resource_id, user_id = %user_id, "Deleting lab resource");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&LabDeleteRequest {
                lab_request_id: resource_id.as_str(),
                user_id: user_id.as_str(),
            })
            .send()
            .await
            .map_err(transport_error)?;

        let (status, body) = read_response(response).await;
        if !status.is_success() {
            tracing::debug!(status = %status, body = %body, "Lab deletion rejected");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(DeleteAck {
            status: status.as_u16(),
        })
    }
}
