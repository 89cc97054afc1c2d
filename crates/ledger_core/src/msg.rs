use crate::{
    FeedPage, JobId, JobResults, LocalJobRecord, Millis, PageId, ReconciledJobs, RemoteError,
    Row, RowBounds, RowField, SaveToken, SavedRows, StatusReport,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Virtual clock advance; fires every timer due at `now`.
    Tick { now: Millis },
    /// Persisted job list restored at startup, before any refresh.
    JobCacheLoaded(Vec<LocalJobRecord>),
    /// Background refresh of the restored list finished. A 401 arrives as
    /// an unauthorized error.
    JobCacheReconciled(Result<ReconciledJobs, RemoteError>),
    /// A job was created elsewhere (upload form) and accepted by the server.
    JobCreated(LocalJobRecord),
    /// User opened a job in the review view.
    OpenJob { job_id: JobId },
    /// User asked the backend to start processing the open job.
    StartJobClicked,
    /// Backend answer to the start action.
    JobStarted {
        job_id: JobId,
        result: Result<bool, RemoteError>,
    },
    /// Backend answer to a status fetch.
    StatusReceived {
        job_id: JobId,
        generation: u64,
        result: Result<StatusReport, RemoteError>,
    },
    /// Cleaned pages and summary of a completed job.
    ResultsLoaded {
        job_id: JobId,
        result: Result<JobResults, RemoteError>,
    },
    /// User selected a page.
    PageSelected { page: PageId },
    PageRowsLoaded {
        job_id: JobId,
        page: PageId,
        result: Result<Vec<Row>, RemoteError>,
    },
    RowBoundsLoaded {
        job_id: JobId,
        page: PageId,
        result: Result<Vec<RowBounds>, RemoteError>,
    },
    /// User changed one cell.
    CellEdited {
        page: PageId,
        row_id: String,
        field: RowField,
        value: String,
    },
    RowAppended { page: PageId },
    RowDeleted { page: PageId, row_id: String },
    /// User flipped the page's row order.
    RowsReversed { page: PageId },
    RowSelected { row_id: Option<String> },
    /// Issue every pending debounced save now (navigation, shutdown).
    FlushSaves,
    /// Backend answer to a page save.
    RowsSaved {
        job_id: JobId,
        page: PageId,
        token: SaveToken,
        result: Result<SavedRows, RemoteError>,
    },
    /// The attachment feed view became visible.
    FeedOpened,
    /// The attachment feed view was left.
    FeedClosed,
    FeedLoadMore,
    FeedPageLoaded {
        generation: u64,
        offset: u32,
        result: Result<FeedPage, RemoteError>,
    },
    /// User asked to process an external attachment.
    BeginProcessClicked { attachment_id: String },
    ProcessBegun {
        attachment_id: String,
        result: Result<JobId, RemoteError>,
    },
    BindingStatusReceived {
        attachment_id: String,
        job_id: JobId,
        result: Result<StatusReport, RemoteError>,
    },
    /// Changes nothing by itself. A driver sends it to wake a waiting loop,
    /// which advances the clock before applying any message.
    NoOp,
}
