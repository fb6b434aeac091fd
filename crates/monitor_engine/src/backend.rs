use monitor_core::{JobStatus, JobStatusReport, SessionId, StartRequest};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::settings::BackendSettings;
use crate::{ApiError, FailureKind, StartedJob};

/// Backend operations the monitor needs. Implemented over HTTP by [`ReqwestBackend`].
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn start_job(&self, request: &StartRequest) -> Result<StartedJob, ApiError>;

    async fn job_status(&self, session_id: &SessionId) -> Result<JobStatusReport, ApiError>;

    async fn fetch_logs(&self, session_id: &SessionId) -> Result<Vec<String>, ApiError>;

    /// Re-fetches one cache endpoint; the body is discarded.
    async fn refresh(&self, endpoint: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    settings: BackendSettings,
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(settings: BackendSettings) -> Result<Self, ApiError> {
        let client = build_client(&settings)?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    #[serde(default)]
    session_id: Option<serde_json::Value>,
    #[serde(default)]
    job_id: Option<serde_json::Value>,
    #[serde(default)]
    transform_id: Option<serde_json::Value>,
    #[serde(default)]
    status: Option<JobStatus>,
}

#[derive(Debug, Deserialize)]
struct LogsResponse {
    #[serde(default)]
    log_entries: Vec<String>,
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn start_job(&self, request: &StartRequest) -> Result<StartedJob, ApiError> {
        let url = self.settings.endpoint_url(&request.endpoint)?;
        let builder = self.client.post(url).json(&request.body);
        let response: StartResponse =
            read_json(send(authorize(builder, &self.settings)).await?).await?;

        let session_id = [response.session_id, response.job_id, response.transform_id]
            .into_iter()
            .flatten()
            .find_map(id_text)
            .ok_or_else(|| {
                ApiError::new(FailureKind::Decode, "start response carried no session id")
            })?;

        Ok(StartedJob {
            session_id: SessionId::new(session_id),
            status: response.status,
        })
    }

    async fn job_status(&self, session_id: &SessionId) -> Result<JobStatusReport, ApiError> {
        let url = self
            .settings
            .session_url(&self.settings.status_endpoint, session_id)?;
        let builder = self.client.get(url);
        read_json(send(authorize(builder, &self.settings)).await?).await
    }

    async fn fetch_logs(&self, session_id: &SessionId) -> Result<Vec<String>, ApiError> {
        let url = self.settings.logs_url(session_id)?;
        let builder = self.client.get(url);
        let response: LogsResponse =
            read_json(send(authorize(builder, &self.settings)).await?).await?;
        Ok(response.log_entries)
    }

    async fn refresh(&self, endpoint: &str) -> Result<(), ApiError> {
        let url = self.settings.endpoint_url(endpoint)?;
        let builder = self.client.get(url);
        send(authorize(builder, &self.settings)).await?;
        Ok(())
    }
}

pub(crate) fn build_client(settings: &BackendSettings) -> Result<reqwest::Client, ApiError> {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .build()
        .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))
}

pub(crate) fn authorize(builder: RequestBuilder, settings: &BackendSettings) -> RequestBuilder {
    match settings.api_key.as_deref() {
        Some(key) if !key.is_empty() => builder.bearer_auth(key),
        _ => builder,
    }
}

/// Sends a request; non-2xx responses become `HttpStatus` errors carrying the body's detail.
pub(crate) async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
    let response = builder.send().await.map_err(map_reqwest_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_detail(&body).unwrap_or_else(|| status.to_string());
    Err(ApiError::new(FailureKind::HttpStatus(status.as_u16()), message))
}

pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
}

/// Pulls the human-readable reason out of an error body: `detail`, then `message`, then `error`.
pub(crate) fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "message", "error"]
        .into_iter()
        .filter_map(|key| value.get(key))
        .find_map(|field| match field {
            serde_json::Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            serde_json::Value::Null | serde_json::Value::String(_) => None,
            other => Some(other.to_string()),
        })
}

fn id_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) if !text.is_empty() => Some(text),
        serde_json::Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return ApiError::new(FailureKind::InvalidUrl, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
