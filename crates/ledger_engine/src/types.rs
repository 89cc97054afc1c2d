//! Wire payloads of the statement backend and the error type of every call.
use std::fmt;

use ledger_core::{
    clamp_progress, FeedPage, FeedRecord, JobStatus, LinkedJob, ParseMode, RemoteError,
    RemoteErrorKind, Row, SavedRows, StatusReport, Summary,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// 401: the session cookie is missing or expired.
    Unauthorized,
    /// 404: the job, page or attachment is gone.
    NotFound,
    HttpStatus(u16),
    Timeout,
    Network,
    /// Body did not match the expected payload.
    Decode,
    InvalidUrl,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Unauthorized => write!(f, "not authenticated"),
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "unexpected response"),
            FailureKind::InvalidUrl => write!(f, "invalid url"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == FailureKind::Unauthorized
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == FailureKind::NotFound
    }
}

impl From<ApiError> for RemoteError {
    fn from(err: ApiError) -> Self {
        let kind = match err.kind {
            FailureKind::Unauthorized => RemoteErrorKind::Unauthorized,
            FailureKind::NotFound => RemoteErrorKind::NotFound,
            _ => RemoteErrorKind::Transient,
        };
        RemoteError::new(kind, err.to_string())
    }
}

/// `GET /jobs/{id}`. Every field is optional; progress may arrive as a
/// number or a numeric string.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StatusPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    step: Option<String>,
    #[serde(default)]
    progress: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    parse_mode: Option<String>,
}

impl StatusPayload {
    pub(crate) fn into_report(self) -> StatusReport {
        StatusReport {
            status: self.status.as_deref().and_then(JobStatus::parse),
            step: self.step,
            progress: self.progress.as_ref().and_then(progress_value),
            message: self.message.or(self.error).filter(|m| !m.trim().is_empty()),
            parse_mode: self.parse_mode.as_deref().map(ParseMode::parse),
        }
    }
}

fn progress_value(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f.round() as i64))?,
        Value::String(text) => text.trim().parse::<f64>().ok()?.round() as i64,
        _ => return None,
    };
    Some(clamp_progress(raw))
}

/// `POST /jobs/{id}/start`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StartPayload {
    #[serde(default)]
    pub(crate) started: bool,
}

/// `GET /jobs/{id}/cleaned`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CleanedPayload {
    #[serde(default)]
    pub(crate) pages: Vec<String>,
}

/// `PUT /jobs/{id}/parsed/{page}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SavePayload {
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    summary: Option<Value>,
}

impl SavePayload {
    pub(crate) fn into_saved(self) -> SavedRows {
        SavedRows {
            rows: self.rows,
            summary: self.summary.map(Summary::from_value),
        }
    }
}

/// `GET /crm/attachments`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FeedPayload {
    #[serde(default)]
    items: Vec<FeedItemPayload>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedItemPayload {
    attachment_id: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    account_name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    size_bytes: u64,
    #[serde(default)]
    process_job_id: String,
    #[serde(default)]
    process_status: String,
    #[serde(default)]
    process_step: String,
    #[serde(default)]
    process_progress: i64,
}

impl FeedPayload {
    pub(crate) fn into_page(self) -> FeedPage {
        FeedPage {
            items: self.items.into_iter().map(FeedItemPayload::into_record).collect(),
            has_more: self.has_more,
            next_offset: self.next_offset,
        }
    }
}

impl FeedItemPayload {
    fn into_record(self) -> FeedRecord {
        let job_id = self.process_job_id.trim();
        let linked_job = (!job_id.is_empty()).then(|| LinkedJob {
            job_id: job_id.to_string(),
            // `not_started` and unknown labels carry no status.
            status: JobStatus::parse(&self.process_status),
            step: self.process_step.clone(),
            progress: self.process_progress,
        });
        FeedRecord {
            attachment_id: self.attachment_id,
            filename: self.filename,
            account_name: self.account_name,
            availability: self.status,
            size_bytes: self.size_bytes,
            linked_job,
        }
    }
}

/// `POST /crm/attachments/{id}/begin-process`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BeginProcessPayload {
    pub(crate) job_id: String,
}

/// FastAPI error body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub(crate) detail: Option<Value>,
}
