//! Refresh of the local job list against the backend.
use ledger_core::{
    merge_lookup, LocalJobRecord, MergeOutcome, ReconciledJobs, StatusLookup, JOB_CACHE_LIMIT,
};
use ledger_logging::{ledger_debug, ledger_info, ledger_warn};

use crate::{ApiError, Backend, FailureKind, JobCacheStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The merged list, already persisted.
    Updated(Vec<LocalJobRecord>),
    /// A 401 stopped the pass; nothing was written.
    Unauthorized,
}

/// Fetches the status of every record (most recent first, one at a time).
/// Jobs the server no longer knows are listed as dropped; jobs whose status
/// cannot be fetched are kept as they were. A 401 stops the pass.
pub async fn reconcile_records(
    backend: &dyn Backend,
    mut records: Vec<LocalJobRecord>,
) -> Result<ReconciledJobs, ApiError> {
    records.truncate(JOB_CACHE_LIMIT);
    ledger_info!("Reconciling {} cached jobs", records.len());

    let mut reconciled = ReconciledJobs::default();
    for record in records {
        let lookup = lookup_status(backend, &record.job_id).await;
        let job_id = record.job_id.clone();
        match merge_lookup(record, lookup) {
            MergeOutcome::Keep(record) => reconciled.records.push(record),
            MergeOutcome::Drop => {
                ledger_debug!("Dropping cached job {} (gone on server)", job_id);
                reconciled.dropped.push(job_id);
            }
            MergeOutcome::Abort => {
                ledger_warn!("Session rejected while reconciling job {}", job_id);
                return Err(ApiError::new(
                    FailureKind::Unauthorized,
                    format!("session rejected while refreshing job {job_id}"),
                ));
            }
        }
    }
    Ok(reconciled)
}

/// Reconciles the stored list and persists the result. Used where nothing
/// else writes the store concurrently.
pub async fn reconcile_job_cache(
    backend: &dyn Backend,
    store: &dyn JobCacheStore,
) -> ReconcileOutcome {
    match reconcile_records(backend, store.load()).await {
        Ok(reconciled) => {
            if let Err(err) = store.save(&reconciled.records) {
                ledger_warn!("Failed to persist reconciled job cache: {}", err);
            }
            ReconcileOutcome::Updated(reconciled.records)
        }
        Err(_) => ReconcileOutcome::Unauthorized,
    }
}

async fn lookup_status(backend: &dyn Backend, job_id: &str) -> StatusLookup {
    match backend.job_status(job_id).await {
        Ok(report) => StatusLookup::Found(report),
        Err(err) => lookup_failure(job_id, err),
    }
}

fn lookup_failure(job_id: &str, err: ApiError) -> StatusLookup {
    if err.is_unauthorized() {
        StatusLookup::Unauthorized
    } else if err.is_not_found() {
        StatusLookup::NotFound
    } else {
        ledger_debug!("Keeping cached job {} unchanged: {}", job_id, err);
        StatusLookup::Unavailable(err.to_string())
    }
}
