pub mod config;
pub mod schemas;

use async_trait::async_trait;
use tracing::{debug, info};
use vg_core::error::{Error, Result, ValidationError};
use vg_core::{Credential, GenerationRequest};

use crate::generator::backend::config::GenBackendConfig;
use crate::generator::backend::schemas::{
    ApiErrorBody, CreateVideoRequest, JobHandle, JobStatusReport, VideoGenerationResponse,
    VideoStatusResponse,
};

/// The remote generation service, as seen by the submitter and the poller.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Start a job. Rejects invalid input before touching the network.
    async fn start_job(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<JobHandle>;

    async fn get_job_status(&self, job_id: &str, credential: &Credential)
        -> Result<JobStatusReport>;
}

/// HTTP client for the video generation API.
pub struct GenBackend {
    client: reqwest::Client,
    config: GenBackendConfig,
}

impl GenBackend {
    pub fn new(config: GenBackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    /// Map a non-2xx response to a remote error, preferring the service's
    /// own message over the bare status code.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("API Error: {}", status.as_u16()));

        Err(Error::remote(message))
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let response = Self::ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::remote(format!("Malformed response from service: {e}")))
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::remote(format!("Failed to reach video service: {e}"))
}

#[async_trait]
impl JobBackend for GenBackend {
    async fn start_job(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<JobHandle> {
        request.validate()?;

        let body = CreateVideoRequest::from(request);
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let created: VideoGenerationResponse = Self::parse_response(response).await?;
        info!(job_id = %created.id, status = %created.status, "Video generation started");

        Ok(created.into())
    }

    async fn get_job_status(
        &self,
        job_id: &str,
        credential: &Credential,
    ) -> Result<JobStatusReport> {
        if job_id.trim().is_empty() {
            return Err(ValidationError::MissingJobId.into());
        }

        let response = self
            .client
            .get(format!("{}/{}", self.endpoint(), job_id))
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(transport_error)?;

        let status: VideoStatusResponse = Self::parse_response(response).await?;
        debug!(job_id, status = %status.status, "Fetched job status");

        Ok(status.into())
    }
}
