use crate::{JobStatus, LocalJobRecord, PageId, ParseMode, PollPhase, Row, RowBounds, Summary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Last message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppViewModel {
    pub job: Option<JobView>,
    pub pages: Vec<PageId>,
    pub active_page: Option<PageId>,
    pub rows: Vec<RowView>,
    pub row_count: usize,
    pub mismatch_count: usize,
    /// Changes only when the row sequence was replaced, not edited in place.
    pub rows_revision: u64,
    pub selected_row: Option<String>,
    pub row_bounds: Vec<RowBounds>,
    /// `None` also when the backend returned an empty summary.
    pub summary: Option<Summary>,
    pub cached_jobs: Vec<LocalJobRecord>,
    pub feed: FeedView,
    pub notice: Option<Notice>,
    pub auth_required: bool,
    pub saves_in_flight: usize,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobView {
    pub job_id: String,
    pub status: JobStatus,
    pub step: String,
    pub progress: u8,
    pub parse_mode: ParseMode,
    pub polling: bool,
    pub phase: PollPhase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub row: Row,
    pub balance_mismatch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedView {
    pub active: bool,
    pub loading: bool,
    pub has_more: bool,
    pub items: Vec<FeedItemView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItemView {
    pub attachment_id: String,
    pub filename: String,
    pub account_name: String,
    pub availability: String,
    pub binding: Option<BindingView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingView {
    pub job_id: Option<String>,
    pub status: JobStatus,
    pub step: String,
    pub progress: u8,
    /// Creation request still in flight; the "process" action stays disabled.
    pub creating: bool,
}
