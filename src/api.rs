//! Instance-management API client
//!
//! Direct HTTP via reqwest against the provider's REST endpoints. Two
//! operations are consumed: start an instance (returns an asynchronous
//! operation envelope) and fetch an operation's status. Responses use the
//! provider's wire shapes: start returns an `operations` array of which
//! the first entry is the start operation, status fetch returns a single
//! `operation` envelope.
//!
//! The client deliberately carries no transport retry: a run issues at most
//! one start request, and a failed call propagates to the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StartError;
use crate::types::ApiConfig;

/// Operation lifecycle states reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum OperationStatus {
    NotStarted,
    Started,
    Failed,
    Succeeded,
    /// States this client does not model; treated as still pending.
    #[serde(other)]
    Other,
}

/// The two provider operations a start run consumes.
#[async_trait]
pub trait InstanceApi: Send + Sync {
    /// Request an instance start. Returns the id of the asynchronous
    /// operation tracking it.
    async fn start_instance(&self, name: &str) -> Result<String, StartError>;

    /// Fetch the current status of an operation by id.
    async fn get_operation_status(&self, operation_id: &str) -> Result<OperationStatus, StartError>;
}

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartInstanceResponse {
    #[serde(default)]
    operations: Vec<OperationEnvelope>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetOperationResponse {
    operation: OperationEnvelope,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationEnvelope {
    id: String,
    #[serde(default)]
    status: Option<OperationStatus>,
}

// ============================================================================
// HTTP client
// ============================================================================

/// reqwest-backed `InstanceApi` implementation.
#[derive(Debug)]
pub struct InstanceApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl InstanceApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, StartError> {
        if config.base_url.is_empty() {
            return Err(StartError::Configuration(
                "api.baseUrl is not set".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Map non-success HTTP statuses to typed errors, keeping the body as
    /// the error message.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StartError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(StartError::AuthRejected);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StartError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl InstanceApi for InstanceApiClient {
    async fn start_instance(&self, name: &str) -> Result<String, StartError> {
        let url = format!("{}/instances/{}/start", self.base_url, name);
        let resp = self.authed(self.http.post(&url)).send().await?;
        let resp = Self::check_status(resp).await?;

        let body: StartInstanceResponse = resp.json().await?;
        body.operations
            .into_iter()
            .next()
            .map(|op| op.id)
            .ok_or(StartError::MissingOperationId)
    }

    async fn get_operation_status(&self, operation_id: &str) -> Result<OperationStatus, StartError> {
        let url = format!("{}/operations/{}", self.base_url, operation_id);
        let resp = self.authed(self.http.get(&url)).send().await?;
        let resp = Self::check_status(resp).await?;

        let body: GetOperationResponse = resp.json().await?;
        Ok(body.operation.status.unwrap_or(OperationStatus::Other))
    }
}
