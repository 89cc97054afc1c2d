//! Ledger core: pure state machine for reviewing processed statements.
//!
//! Nothing in here performs IO or reads a clock. The driver feeds [`Msg`]s
//! (user actions, backend answers, clock ticks) into [`update`] and executes
//! the returned [`Effect`]s.
mod balance;
mod cache;
mod effect;
mod feed;
mod job;
mod msg;
mod pages;
mod poll;
mod results;
mod row;
mod schedule;
mod state;
mod update;
mod view_model;

pub use balance::{balance_mismatches, BALANCE_TOLERANCE};
pub use cache::{
    merge_lookup, JobCache, LocalJobRecord, MergeOutcome, ReconciledJobs, StatusLookup,
    JOB_CACHE_LIMIT,
};
pub use effect::Effect;
pub use feed::{
    AttachmentBinding, FeedPage, FeedRecord, FeedRequest, FeedState, LinkedJob, ProbeMode,
    DEFAULT_FEED_PAGE_SIZE, MAX_FEED_PAGE_SIZE,
};
pub use job::{clamp_progress, JobId, JobSnapshot, JobStatus, ParseMode, StatusReport};
pub use msg::Msg;
pub use pages::{SaveApplied, SaveController, SaveToken};
pub use poll::{JobTracker, PollPhase, StatusStep};
pub use results::{JobResults, RemoteError, RemoteErrorKind, RowBounds, SavedRows, Summary};
pub use row::{
    assign_row_ids, normalize_amount, normalize_rows, page_id_from_file, parse_amount, PageId,
    Row, RowField,
};
pub use schedule::{
    Millis, Scheduler, TimerKey, AUTOSAVE_DEBOUNCE_MS, FEED_POLL_INTERVAL_MS,
    JOB_POLL_INTERVAL_MS,
};
pub use state::AppState;
pub use update::update;
pub use view_model::{
    AppViewModel, BindingView, FeedItemView, FeedView, JobView, Notice, NoticeLevel, RowView,
};
