use std::time::Duration;

use monitor_core::SessionId;
use url::Url;

use crate::{ApiError, FailureKind};

/// Placeholder substituted with the session id in endpoint templates.
pub(crate) const SESSION_PLACEHOLDER: &str = "{session_id}";

/// Where the backend lives and how the engine talks to it.
///
/// Endpoint values are absolute paths joined onto `base_url`; any
/// `{session_id}` in them is replaced with the monitored session.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: Url,
    /// Overrides the host used for the progress socket. Defaults to `base_url`.
    pub socket_base_url: Option<Url>,
    pub api_key: Option<String>,
    pub status_endpoint: String,
    pub logs_endpoint: String,
    pub socket_path: String,
    /// Fetched once when a session reaches a terminal status.
    pub refresh_endpoints: Vec<String>,
    pub poll_interval: Duration,
    pub log_lines: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl BackendSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            socket_base_url: None,
            api_key: None,
            status_endpoint: "/api/archive/jobs/{session_id}".to_string(),
            logs_endpoint: "/api/archive/logs/import".to_string(),
            socket_path: "/ws/progress/{session_id}".to_string(),
            refresh_endpoints: Vec::new(),
            poll_interval: Duration::from_secs(2),
            log_lines: 100,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Resolves an endpoint path against `base_url`.
    pub fn endpoint_url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, format!("{path}: {err}")))
    }

    /// Resolves an endpoint template for a session. The id is inserted as
    /// encoded path text, so it can never add segments or a query.
    pub fn session_url(&self, template: &str, session_id: &SessionId) -> Result<Url, ApiError> {
        session_path_url(&self.base_url, template, session_id)
    }

    pub fn logs_url(&self, session_id: &SessionId) -> Result<Url, ApiError> {
        let mut url = self.session_url(&self.logs_endpoint, session_id)?;
        url.query_pairs_mut()
            .append_pair("lines", &self.log_lines.to_string());
        Ok(url)
    }
}

/// Replaces the path of `base` with `template`, one encoded segment per `/`-separated part.
pub(crate) fn session_path_url(
    base: &Url,
    template: &str,
    session_id: &SessionId,
) -> Result<Url, ApiError> {
    let id = checked_segment(session_id.as_str())?;
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut segments = url.path_segments_mut().map_err(|()| no_path(base))?;
        segments.clear();
        for part in template.split('/').filter(|part| !part.is_empty()) {
            segments.push(&part.replace(SESSION_PLACEHOLDER, id));
        }
    }
    Ok(url)
}

/// Appends `id` to `url` as a single encoded path segment.
pub(crate) fn push_id_segment(mut url: Url, id: &str) -> Result<Url, ApiError> {
    let id = checked_segment(id)?;
    url.path_segments_mut()
        .map_err(|()| ApiError::new(FailureKind::InvalidUrl, "url cannot carry a path"))?
        .pop_if_empty()
        .push(id);
    Ok(url)
}

/// `.` and `..` would be dropped by URL normalisation and address the parent resource.
fn checked_segment(id: &str) -> Result<&str, ApiError> {
    if id.trim().is_empty() || id == "." || id == ".." {
        return Err(ApiError::new(
            FailureKind::InvalidInput,
            format!("{id:?} is not a usable id"),
        ));
    }
    Ok(id)
}

fn no_path(base: &Url) -> ApiError {
    ApiError::new(FailureKind::InvalidUrl, format!("{base} cannot carry a path"))
}
