use std::collections::BTreeMap;

use crate::view_model::{
    AppViewModel, BindingView, FeedItemView, FeedView, JobView, Notice, NoticeLevel, RowView,
};
use crate::{
    FeedState, JobCache, JobTracker, Millis, PageId, PollPhase, ProbeMode, RowBounds,
    SaveController, Scheduler, Summary,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub(crate) now: Millis,
    pub(crate) scheduler: Scheduler,
    pub(crate) tracker: JobTracker,
    pub(crate) saves: SaveController,
    pub(crate) pages: Vec<PageId>,
    pub(crate) active_page: Option<PageId>,
    pub(crate) bounds: BTreeMap<PageId, Vec<RowBounds>>,
    pub(crate) summary: Option<Summary>,
    pub(crate) results_requested: bool,
    pub(crate) cache: JobCache,
    pub(crate) feed: FeedState,
    /// Job to open once in-flight saves have settled.
    pub(crate) pending_open: Option<String>,
    pub(crate) notice: Option<Notice>,
    pub(crate) auth_required: bool,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page size (clamped to 1..=200) and probe depth for feed requests.
    pub fn with_feed_options(mut self, page_size: u32, probe: ProbeMode) -> Self {
        self.feed.configure(page_size, probe);
        self
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    /// Earliest armed timer, for the driver to sleep until.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.scheduler.next_deadline()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn saves(&self) -> &SaveController {
        &self.saves
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn feed(&self) -> &FeedState {
        &self.feed
    }

    pub fn job_cache(&self) -> &JobCache {
        &self.cache
    }

    /// True once pages and summary of the open job arrived, even if empty.
    pub fn results_loaded(&self) -> bool {
        self.summary.is_some()
    }

    pub fn view(&self) -> AppViewModel {
        let job = self.tracker.job_id().map(|job_id| {
            let snapshot = self.tracker.snapshot();
            JobView {
                job_id: job_id.to_string(),
                status: snapshot.status,
                step: snapshot.step.clone(),
                progress: snapshot.progress,
                parse_mode: snapshot.parse_mode,
                polling: self.tracker.phase() == PollPhase::Polling,
                phase: self.tracker.phase(),
            }
        });

        let (rows, rows_revision) = match self.active_page.as_deref() {
            Some(page) => {
                let mismatches = self.saves.mismatches(page);
                let rows = self
                    .saves
                    .rows(page)
                    .unwrap_or_default()
                    .iter()
                    .map(|row| RowView {
                        row: row.clone(),
                        balance_mismatch: mismatches
                            .is_some_and(|flagged| flagged.contains(&row.row_id)),
                    })
                    .collect();
                (rows, self.saves.revision(page))
            }
            None => (Vec::new(), 0),
        };
        let mismatch_count = rows.iter().filter(|row: &&RowView| row.balance_mismatch).count();
        let selected_row = self
            .saves
            .selected()
            .filter(|(page, _)| self.active_page.as_deref() == Some(*page))
            .map(|(_, row_id)| row_id.to_string());

        let feed = FeedView {
            active: self.feed.is_active(),
            loading: self.feed.is_loading(),
            has_more: self.feed.has_more(),
            items: self
                .feed
                .records()
                .iter()
                .map(|record| FeedItemView {
                    attachment_id: record.attachment_id.clone(),
                    filename: record.filename.clone(),
                    account_name: record.account_name.clone(),
                    availability: record.availability.clone(),
                    binding: self
                        .feed
                        .binding(&record.attachment_id)
                        .map(|binding| BindingView {
                            job_id: binding.job_id.clone(),
                            status: binding.status,
                            step: binding.step.clone(),
                            progress: binding.progress,
                            creating: binding.job_id.is_none(),
                        }),
                })
                .collect(),
        };

        AppViewModel {
            job,
            pages: self.pages.clone(),
            active_page: self.active_page.clone(),
            row_count: rows.len(),
            mismatch_count,
            rows,
            rows_revision,
            selected_row,
            row_bounds: self
                .active_page
                .as_deref()
                .and_then(|page| self.bounds.get(page))
                .cloned()
                .unwrap_or_default(),
            summary: self.summary.clone().filter(|summary| !summary.is_empty()),
            cached_jobs: self.cache.records().to_vec(),
            feed,
            notice: self.notice.clone(),
            auth_required: self.auth_required,
            saves_in_flight: self.saves.in_flight_count(),
            dirty: self.dirty,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether a render is due and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn report_error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            level: NoticeLevel::Error,
            text: text.into(),
        });
        self.dirty = true;
    }

    pub(crate) fn report_info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        });
        self.dirty = true;
    }
}
