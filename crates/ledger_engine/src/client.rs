use std::time::Duration;

use ledger_core::{
    FeedPage, FeedRequest, JobId, Row, RowBounds, SavedRows, StatusReport, Summary,
};
use ledger_logging::ledger_debug;
use reqwest::header::COOKIE;
use serde::de::DeserializeOwned;
use url::Url;

use crate::types::{
    BeginProcessPayload, CleanedPayload, ErrorBody, FeedPayload, SavePayload, StartPayload,
    StatusPayload,
};
use crate::{ApiError, FailureKind};

/// Name of the cookie that carries the backend session.
pub const SESSION_COOKIE: &str = "bank_stmt_session";

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Value of the session cookie; `None` sends no cookie.
    pub session_token: Option<String>,
    pub session_cookie: String,
}

impl BackendSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            session_token: None,
            session_cookie: SESSION_COOKIE.to_string(),
        }
    }
}

/// Every backend call the review client makes.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn job_status(&self, job_id: &str) -> Result<StatusReport, ApiError>;

    /// Returns whether processing was (re)started by this call.
    async fn start_job(&self, job_id: &str) -> Result<bool, ApiError>;

    /// Cleaned page image names, in page order.
    async fn cleaned_pages(&self, job_id: &str) -> Result<Vec<String>, ApiError>;

    async fn summary(&self, job_id: &str) -> Result<Summary, ApiError>;

    async fn page_rows(&self, job_id: &str, page: &str) -> Result<Vec<Row>, ApiError>;

    /// Replaces the rows of one page wholesale.
    async fn save_page_rows(
        &self,
        job_id: &str,
        page: &str,
        rows: &[Row],
    ) -> Result<SavedRows, ApiError>;

    async fn row_bounds(&self, job_id: &str, page: &str) -> Result<Vec<RowBounds>, ApiError>;

    async fn feed_page(&self, request: FeedRequest) -> Result<FeedPage, ApiError>;

    /// Creates a job from an external attachment.
    async fn begin_process(&self, attachment_id: &str) -> Result<JobId, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    settings: BackendSettings,
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new(settings: BackendSettings) -> Result<Self, ApiError> {
        if settings.base_url.cannot_be_a_base() {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    /// `base_url` with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.settings.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::new(FailureKind::InvalidUrl, "base url has no path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let request = match &self.settings.session_token {
            Some(token) => request.header(
                COOKIE,
                format!("{}={}", self.settings.session_cookie, token),
            ),
            None => request,
        };
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = error_detail(response).await;
        ledger_debug!("Backend answered {} ({})", status, detail);
        let kind = match status.as_u16() {
            401 => FailureKind::Unauthorized,
            404 => FailureKind::NotFound,
            code => FailureKind::HttpStatus(code),
        };
        Err(ApiError::new(kind, detail))
    }

    async fn json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        self.json(self.client.get(url)).await
    }

    async fn post<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        self.json(self.client.post(url)).await
    }
}

#[async_trait::async_trait]
impl Backend for ReqwestBackend {
    async fn job_status(&self, job_id: &str) -> Result<StatusReport, ApiError> {
        let payload: StatusPayload = self.get(&["jobs", job_id]).await?;
        Ok(payload.into_report())
    }

    async fn start_job(&self, job_id: &str) -> Result<bool, ApiError> {
        let payload: StartPayload = self.post(&["jobs", job_id, "start"]).await?;
        Ok(payload.started)
    }

    async fn cleaned_pages(&self, job_id: &str) -> Result<Vec<String>, ApiError> {
        let payload: CleanedPayload = self.get(&["jobs", job_id, "cleaned"]).await?;
        Ok(payload.pages)
    }

    async fn summary(&self, job_id: &str) -> Result<Summary, ApiError> {
        let value: serde_json::Value = self.get(&["jobs", job_id, "summary"]).await?;
        Ok(Summary::from_value(value))
    }

    async fn page_rows(&self, job_id: &str, page: &str) -> Result<Vec<Row>, ApiError> {
        self.get(&["jobs", job_id, "parsed", page]).await
    }

    async fn save_page_rows(
        &self,
        job_id: &str,
        page: &str,
        rows: &[Row],
    ) -> Result<SavedRows, ApiError> {
        let url = self.endpoint(&["jobs", job_id, "parsed", page])?;
        let payload: SavePayload = self.json(self.client.put(url).json(rows)).await?;
        Ok(payload.into_saved())
    }

    async fn row_bounds(&self, job_id: &str, page: &str) -> Result<Vec<RowBounds>, ApiError> {
        self.get(&["jobs", job_id, "rows", page, "bounds"]).await
    }

    async fn feed_page(&self, request: FeedRequest) -> Result<FeedPage, ApiError> {
        let mut url = self.endpoint(&["crm", "attachments"])?;
        url.query_pairs_mut()
            .append_pair("limit", &request.limit.to_string())
            .append_pair("offset", &request.offset.to_string())
            .append_pair("probe", request.probe.as_str());
        let payload: FeedPayload = self.json(self.client.get(url)).await?;
        Ok(payload.into_page())
    }

    async fn begin_process(&self, attachment_id: &str) -> Result<JobId, ApiError> {
        let payload: BeginProcessPayload = self
            .post(&["crm", "attachments", attachment_id, "begin-process"])
            .await?;
        Ok(payload.job_id)
    }
}

/// Best-effort `detail` of an error response, else its status line.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(ErrorBody {
            detail: Some(serde_json::Value::String(detail)),
        }) => detail,
        Ok(ErrorBody {
            detail: Some(other),
        }) => other.to_string(),
        _ if !text.trim().is_empty() && text.len() <= 200 => text.trim().to_string(),
        _ => status.to_string(),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::Decode, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
