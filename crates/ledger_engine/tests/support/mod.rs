//! Scripted in-memory backend shared by the engine tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, Once};
use std::time::Duration;

use ledger_core::{
    FeedPage, FeedRequest, JobId, JobStatus, Row, RowBounds, SavedRows, StatusReport, Summary,
};
use ledger_engine::{ApiError, Backend, FailureKind};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(ledger_logging::initialize_for_tests);
}

pub fn report(status: JobStatus, step: &str, progress: u8) -> StatusReport {
    StatusReport {
        status: Some(status),
        step: Some(step.to_string()),
        progress: Some(progress),
        ..StatusReport::default()
    }
}

pub fn row(id: &str, debit: &str, credit: &str, balance: &str) -> Row {
    Row {
        row_id: id.to_string(),
        date: "02/01/2026".to_string(),
        description: format!("line {id}"),
        debit: debit.to_string(),
        credit: credit.to_string(),
        balance: balance.to_string(),
    }
}

#[derive(Default)]
pub struct FakeBackend {
    /// Per job, answers in order; the last one repeats.
    statuses: Mutex<HashMap<String, VecDeque<Result<StatusReport, ApiError>>>>,
    status_delays: Mutex<HashMap<String, Duration>>,
    pages: Mutex<Vec<String>>,
    rows: Mutex<HashMap<String, Vec<Row>>>,
    feed: Mutex<Option<FeedPage>>,
    calls: Mutex<Vec<String>>,
    saves: Mutex<Vec<(String, Vec<Row>)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_status(&self, job_id: &str, answers: Vec<Result<StatusReport, ApiError>>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(job_id.to_string(), answers.into());
    }

    /// Status answers for `job_id` arrive only after `delay`.
    pub fn delay_status(&self, job_id: &str, delay: Duration) {
        self.status_delays
            .lock()
            .unwrap()
            .insert(job_id.to_string(), delay);
    }

    pub fn set_pages(&self, pages: &[&str]) {
        *self.pages.lock().unwrap() = pages.iter().map(|p| p.to_string()).collect();
    }

    pub fn set_rows(&self, page: &str, rows: Vec<Row>) {
        self.rows.lock().unwrap().insert(page.to_string(), rows);
    }

    pub fn set_feed(&self, page: FeedPage) {
        *self.feed.lock().unwrap() = Some(page);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// `(page, rows)` of every save, in arrival order.
    pub fn saves(&self) -> Vec<(String, Vec<Row>)> {
        self.saves.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Backend for FakeBackend {
    async fn job_status(&self, job_id: &str) -> Result<StatusReport, ApiError> {
        self.record(format!("status {job_id}"));
        let delay = self.status_delays.lock().unwrap().get(job_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut statuses = self.statuses.lock().unwrap();
        let Some(queue) = statuses.get_mut(job_id) else {
            return Err(ApiError::new(FailureKind::NotFound, "job_not_found"));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| Err(ApiError::new(FailureKind::NotFound, "job_not_found")))
        }
    }

    async fn start_job(&self, job_id: &str) -> Result<bool, ApiError> {
        self.record(format!("start {job_id}"));
        Ok(true)
    }

    async fn cleaned_pages(&self, job_id: &str) -> Result<Vec<String>, ApiError> {
        self.record(format!("cleaned {job_id}"));
        Ok(self.pages.lock().unwrap().clone())
    }

    async fn summary(&self, job_id: &str) -> Result<Summary, ApiError> {
        self.record(format!("summary {job_id}"));
        Ok(Summary::default())
    }

    async fn page_rows(&self, job_id: &str, page: &str) -> Result<Vec<Row>, ApiError> {
        self.record(format!("rows {job_id} {page}"));
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(page)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_page_rows(
        &self,
        job_id: &str,
        page: &str,
        rows: &[Row],
    ) -> Result<SavedRows, ApiError> {
        self.record(format!("save {job_id} {page}"));
        self.saves
            .lock()
            .unwrap()
            .push((page.to_string(), rows.to_vec()));
        Ok(SavedRows {
            rows: rows.to_vec(),
            summary: None,
        })
    }

    async fn row_bounds(&self, job_id: &str, page: &str) -> Result<Vec<RowBounds>, ApiError> {
        self.record(format!("bounds {job_id} {page}"));
        Ok(Vec::new())
    }

    async fn feed_page(&self, request: FeedRequest) -> Result<FeedPage, ApiError> {
        self.record(format!("feed {}", request.offset));
        self.feed
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::new(FailureKind::HttpStatus(503), "feed unavailable"))
    }

    async fn begin_process(&self, attachment_id: &str) -> Result<JobId, ApiError> {
        self.record(format!("begin {attachment_id}"));
        Ok(format!("J-{attachment_id}"))
    }
}
