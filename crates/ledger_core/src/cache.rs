//! Client-owned list of recently used jobs.
//!
//! The list survives restarts but is never authoritative: server status
//! always wins when it can be fetched.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobSnapshot, JobStatus, ParseMode, StatusReport};

/// Only the most recent jobs are remembered.
pub const JOB_CACHE_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalJobRecord {
    pub job_id: JobId,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub size_bytes: u64,
    /// Source file modification time, epoch milliseconds.
    #[serde(default)]
    pub last_modified: u64,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub step: String,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub parse_mode: ParseMode,
}

impl LocalJobRecord {
    pub fn new(job_id: impl Into<JobId>, file_name: impl Into<String>, created_at: u64) -> Self {
        Self {
            job_id: job_id.into(),
            file_name: file_name.into(),
            created_at,
            ..Self::default()
        }
    }

    /// Merges the fields a status payload carries; everything else is kept.
    pub fn apply_report(&mut self, report: &StatusReport) -> bool {
        let mut snapshot = self.snapshot();
        if !snapshot.merge(report) {
            return false;
        }
        self.status = snapshot.status;
        self.step = snapshot.step;
        self.progress = snapshot.progress;
        self.parse_mode = snapshot.parse_mode;
        true
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            status: self.status,
            step: self.step.clone(),
            progress: self.progress,
            parse_mode: self.parse_mode,
            message: None,
        }
    }
}

/// Result of asking the server about one cached job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLookup {
    Found(StatusReport),
    NotFound,
    Unauthorized,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Keep(LocalJobRecord),
    Drop,
    /// Stop reconciling everything; the session is gone.
    Abort,
}

/// Decides what happens to one cached record given the server's answer.
pub fn merge_lookup(mut record: LocalJobRecord, lookup: StatusLookup) -> MergeOutcome {
    match lookup {
        StatusLookup::Found(report) => {
            record.apply_report(&report);
            MergeOutcome::Keep(record)
        }
        StatusLookup::NotFound => MergeOutcome::Drop,
        StatusLookup::Unauthorized => MergeOutcome::Abort,
        StatusLookup::Unavailable(_) => MergeOutcome::Keep(record),
    }
}

/// Outcome of a background refresh of the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconciledJobs {
    /// Kept records with their refreshed server fields.
    pub records: Vec<LocalJobRecord>,
    /// Jobs the server no longer knows.
    pub dropped: Vec<JobId>,
}

/// Bounded, most-recent-first job list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobCache {
    records: Vec<LocalJobRecord>,
    /// Jobs updated in this session since the list was restored.
    touched: BTreeSet<JobId>,
}

impl JobCache {
    pub fn from_records(mut records: Vec<LocalJobRecord>) -> Self {
        records.truncate(JOB_CACHE_LIMIT);
        Self {
            records,
            touched: BTreeSet::new(),
        }
    }

    pub fn records(&self) -> &[LocalJobRecord] {
        &self.records
    }

    pub fn get(&self, job_id: &str) -> Option<&LocalJobRecord> {
        self.records.iter().find(|record| record.job_id == job_id)
    }

    /// Inserts or replaces a record and moves it to the front.
    pub fn upsert(&mut self, record: LocalJobRecord) {
        self.touched.insert(record.job_id.clone());
        self.records.retain(|existing| existing.job_id != record.job_id);
        self.records.insert(0, record);
        self.records.truncate(JOB_CACHE_LIMIT);
    }

    pub fn apply_report(&mut self, job_id: &str, report: &StatusReport) -> bool {
        let Some(record) = self.records.iter_mut().find(|record| record.job_id == job_id) else {
            return false;
        };
        self.touched.insert(job_id.to_string());
        record.apply_report(report)
    }

    /// Folds a refresh that started from the restored list into the current
    /// one. Jobs updated since then keep their newer fields and are never
    /// dropped. Returns whether anything changed.
    pub fn merge_reconciled(&mut self, reconciled: ReconciledJobs) -> bool {
        let before = self.records.clone();
        let ReconciledJobs { records, dropped } = reconciled;
        self.records.retain(|record| {
            self.touched.contains(&record.job_id) || !dropped.contains(&record.job_id)
        });
        for fresh in records {
            if self.touched.contains(&fresh.job_id) {
                continue;
            }
            if let Some(existing) = self
                .records
                .iter_mut()
                .find(|record| record.job_id == fresh.job_id)
            {
                *existing = fresh;
            }
        }
        self.records != before
    }
}
