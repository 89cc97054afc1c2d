use crate::{FeedRequest, JobId, LocalJobRecord, PageId, Row, SaveToken};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchJobStatus { job_id: JobId, generation: u64 },
    StartJob { job_id: JobId },
    /// Fetch cleaned-page list and summary together.
    LoadResults { job_id: JobId },
    LoadPageRows { job_id: JobId, page: PageId },
    LoadRowBounds { job_id: JobId, page: PageId },
    SaveRows {
        job_id: JobId,
        page: PageId,
        token: SaveToken,
        rows: Vec<Row>,
    },
    FetchFeedPage { request: FeedRequest, generation: u64 },
    BeginProcess { attachment_id: String },
    FetchBindingStatus { attachment_id: String, job_id: JobId },
    /// Replace the persisted job list.
    PersistJobCache { records: Vec<LocalJobRecord> },
    /// The session is gone; hand over to the login flow.
    RequireAuthentication,
}

impl Effect {
    /// Effects that need the backend, as opposed to local bookkeeping.
    pub fn is_remote(&self) -> bool {
        !matches!(
            self,
            Effect::PersistJobCache { .. } | Effect::RequireAuthentication
        )
    }
}
