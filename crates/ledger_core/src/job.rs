use std::fmt;

use serde::{Deserialize, Serialize};

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
    NeedsReview,
}

impl JobStatus {
    /// Parses a server status label. `done` is an older spelling of `completed`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Some(Self::Queued),
            "processing" => Some(Self::Processing),
            "completed" | "done" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "needs_review" => Some(Self::NeedsReview),
            _ => None,
        }
    }

    /// No polling happens after a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses that background binding polls keep following.
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::Queued | Self::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::NeedsReview => "needs_review",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    Text,
    Ocr,
    #[default]
    Unset,
}

impl ParseMode {
    /// Anything other than `text`/`ocr` (including `auto`) is treated as unset.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Self::Text,
            "ocr" => Self::Ocr,
            _ => Self::Unset,
        }
    }
}

pub fn clamp_progress(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

/// One status payload from the backend. Absent fields keep whatever value the
/// receiver already had.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub status: Option<JobStatus>,
    pub step: Option<String>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub parse_mode: Option<ParseMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub step: String,
    pub progress: u8,
    pub parse_mode: ParseMode,
    pub message: Option<String>,
}

impl JobSnapshot {
    /// Merges a report into the snapshot and returns whether anything changed.
    pub fn merge(&mut self, report: &StatusReport) -> bool {
        let before = self.clone();
        if let Some(status) = report.status {
            self.status = status;
        }
        if let Some(step) = &report.step {
            self.step.clone_from(step);
        }
        if let Some(progress) = report.progress {
            self.progress = progress.min(100);
        }
        if let Some(mode) = report.parse_mode {
            if mode != ParseMode::Unset {
                self.parse_mode = mode;
            }
        }
        if report.message.is_some() {
            self.message.clone_from(&report.message);
        }
        *self != before
    }
}
