use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, Response, Url};
use serde::de::DeserializeOwned;

use crate::models::analysis::{
    AnalysisOutcome, AnalyzeRequest, HealthReport, ResultsResponse, StatusResponse,
    UploadResponse,
};
use crate::models::image::ImageUpload;

/// Transport to the remote ingredient analysis service.
///
/// The job client only depends on this trait, so polling could be swapped
/// for a push transport without touching the state machine.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Upload a label image and receive the job id and extracted ingredients.
    async fn upload(&self, image: &ImageUpload) -> Result<UploadResponse, ServiceError>;

    /// Ask the service to evaluate filters. Returns once the job is accepted.
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<(), ServiceError>;

    async fn status(&self, job_id: &str) -> Result<StatusResponse, ServiceError>;

    async fn results(&self, job_id: &str) -> Result<AnalysisOutcome, ServiceError>;

    async fn health(&self) -> Result<HealthReport, ServiceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse service response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid service URL: {0}")]
    Url(String),
}

/// HTTP client for the analysis service's `/api` endpoints.
pub struct HttpAnalysisService {
    http: Client,
    base_url: Url,
}

impl HttpAnalysisService {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url).map_err(|e| ServiceError::Url(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::Url(format!("{} cannot be a base URL", base_url)));
        }
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// Build `<base>/api/<segments...>`, escaping each segment so job ids
    /// containing reserved characters stay a single path component.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn upload(&self, image: &ImageUpload) -> Result<UploadResponse, ServiceError> {
        let part = multipart::Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name())
            .mime_str(image.mime_type())?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint(&["upload"])?)
            .multipart(form)
            .send()
            .await?;

        read_json(response).await
    }

    async fn analyze(&self, request: &AnalyzeRequest) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(self.endpoint(&["analyze"])?)
            .json(request)
            .send()
            .await?;

        // Acceptance only; the body carries nothing the client needs
        ensure_success(response).await?;
        Ok(())
    }

    async fn status(&self, job_id: &str) -> Result<StatusResponse, ServiceError> {
        let response = self
            .http
            .get(self.endpoint(&["status", job_id])?)
            .send()
            .await?;

        read_json(response).await
    }

    async fn results(&self, job_id: &str) -> Result<AnalysisOutcome, ServiceError> {
        let response = self
            .http
            .get(self.endpoint(&["results", job_id])?)
            .send()
            .await?;

        // 202 means the service is still working; only 200 carries results
        if response.status() != reqwest::StatusCode::OK {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { status, body });
        }

        let results: ResultsResponse = read_json(response).await?;
        Ok(results.into())
    }

    async fn health(&self) -> Result<HealthReport, ServiceError> {
        let response = self.http.get(self.endpoint(&["health"])?).send().await?;

        // A degraded service answers 503 with the same body
        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }
        read_json(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let response = ensure_success(response).await?;
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
