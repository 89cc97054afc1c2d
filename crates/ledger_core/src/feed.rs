//! External attachment feed and the jobs started from it.
use std::collections::BTreeMap;

use crate::job::{clamp_progress, JobId, JobStatus, StatusReport};

pub const DEFAULT_FEED_PAGE_SIZE: u32 = 25;
pub const MAX_FEED_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    /// File metadata is only guessed; cheap.
    #[default]
    Lazy,
    /// Every attachment is probed for availability.
    Eager,
}

impl ProbeMode {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "eager" => Self::Eager,
            _ => Self::Lazy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lazy => "lazy",
            Self::Eager => "eager",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedRequest {
    pub limit: u32,
    pub offset: u32,
    pub probe: ProbeMode,
}

/// Job already linked to a record, as reported by the feed itself.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkedJob {
    pub job_id: JobId,
    pub status: Option<JobStatus>,
    pub step: String,
    pub progress: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedRecord {
    pub attachment_id: String,
    pub filename: String,
    pub account_name: String,
    /// Availability reported by the feed (`available`, `unavailable`, ...).
    pub availability: String,
    pub size_bytes: u64,
    pub linked_job: Option<LinkedJob>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedPage {
    pub items: Vec<FeedRecord>,
    pub has_more: bool,
    pub next_offset: Option<u32>,
}

/// Which job is processing an attachment. `job_id` is `None` while the
/// creation request is still in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentBinding {
    pub job_id: Option<JobId>,
    pub status: JobStatus,
    pub step: String,
    pub progress: u8,
}

impl AttachmentBinding {
    fn pending() -> Self {
        Self {
            job_id: None,
            status: JobStatus::Queued,
            step: String::new(),
            progress: 0,
        }
    }

    fn from_linked(linked: &LinkedJob) -> Self {
        Self {
            job_id: Some(linked.job_id.clone()),
            status: linked.status.unwrap_or_default(),
            step: linked.step.clone(),
            progress: clamp_progress(linked.progress),
        }
    }

    /// Whether background polling should still follow this binding.
    pub fn needs_poll(&self) -> bool {
        self.job_id.is_some() && self.status.is_in_progress()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedState {
    active: bool,
    loading: bool,
    page_size: u32,
    probe: ProbeMode,
    records: Vec<FeedRecord>,
    bindings: BTreeMap<String, AttachmentBinding>,
    has_more: bool,
    next_offset: u32,
    /// Bumped by every first-page request; page answers from older
    /// generations are dropped.
    generation: u64,
}

impl FeedState {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn records(&self) -> &[FeedRecord] {
        &self.records
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn binding(&self, attachment_id: &str) -> Option<&AttachmentBinding> {
        self.bindings.get(attachment_id)
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Sets page size (clamped to 1..=200) and probe depth for later requests.
    pub fn configure(&mut self, page_size: u32, probe: ProbeMode) {
        self.page_size = page_size.clamp(1, MAX_FEED_PAGE_SIZE);
        self.probe = probe;
    }

    fn limit(&self) -> u32 {
        if self.page_size == 0 {
            DEFAULT_FEED_PAGE_SIZE
        } else {
            self.page_size
        }
    }

    /// Request for the first page; always allowed. Starts a new generation,
    /// so pages still in flight are ignored when they land.
    pub fn first_page(&mut self) -> FeedRequest {
        self.generation += 1;
        self.loading = true;
        FeedRequest {
            limit: self.limit(),
            offset: 0,
            probe: self.probe,
        }
    }

    /// Request for the following page, if there is one and nothing is loading.
    pub fn next_page(&mut self) -> Option<FeedRequest> {
        if !self.has_more || self.loading {
            return None;
        }
        self.loading = true;
        Some(FeedRequest {
            limit: self.limit(),
            offset: self.next_offset,
            probe: self.probe,
        })
    }

    /// Returns false for a failure from an older generation.
    pub fn load_failed(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.loading = false;
        true
    }

    /// Offset 0 replaces the list, other offsets append. Bindings are
    /// refreshed from records that carry a linked job; on a replace,
    /// bindings whose record is gone are forgotten unless a creation is
    /// still in flight. Returns false (and changes nothing) for a page from
    /// an older generation.
    pub fn apply_page(&mut self, generation: u64, offset: u32, page: FeedPage) -> bool {
        if generation != self.generation {
            return false;
        }
        self.loading = false;
        if offset == 0 {
            self.records.clear();
            self.bindings.retain(|attachment_id, binding| {
                binding.job_id.is_none()
                    || page
                        .items
                        .iter()
                        .any(|record| &record.attachment_id == attachment_id)
            });
        }
        for record in &page.items {
            if let Some(linked) = &record.linked_job {
                self.bindings.insert(
                    record.attachment_id.clone(),
                    AttachmentBinding::from_linked(linked),
                );
            }
        }
        let received = page.items.len() as u32;
        self.records.extend(page.items);
        self.has_more = page.has_more;
        self.next_offset = page.next_offset.unwrap_or(offset + received);
        true
    }

    /// Creates an optimistic binding. Returns false if the record is already
    /// bound (or a creation is already in flight).
    pub fn begin_process(&mut self, attachment_id: &str) -> bool {
        if self.bindings.contains_key(attachment_id) {
            return false;
        }
        self.bindings
            .insert(attachment_id.to_string(), AttachmentBinding::pending());
        true
    }

    pub fn confirm_process(&mut self, attachment_id: &str, job_id: JobId) {
        let binding = self
            .bindings
            .entry(attachment_id.to_string())
            .or_insert_with(AttachmentBinding::pending);
        binding.job_id = Some(job_id);
        binding.status = JobStatus::Queued;
    }

    /// Creation failed: forget the optimistic binding so the record can be
    /// processed again.
    pub fn rollback_process(&mut self, attachment_id: &str) {
        if self
            .bindings
            .get(attachment_id)
            .is_some_and(|binding| binding.job_id.is_none())
        {
            self.bindings.remove(attachment_id);
        }
    }

    /// `(attachment_id, job_id)` for every binding still in progress.
    pub fn poll_targets(&self) -> Vec<(String, JobId)> {
        self.bindings
            .iter()
            .filter(|(_, binding)| binding.needs_poll())
            .filter_map(|(attachment_id, binding)| {
                binding
                    .job_id
                    .clone()
                    .map(|job_id| (attachment_id.clone(), job_id))
            })
            .collect()
    }

    /// Merges a polled status. Returns true only if a visible field changed.
    pub fn merge_status(&mut self, attachment_id: &str, job_id: &str, report: &StatusReport) -> bool {
        let Some(binding) = self.bindings.get_mut(attachment_id) else {
            return false;
        };
        if binding.job_id.as_deref() != Some(job_id) {
            return false;
        }
        let mut changed = false;
        if let Some(status) = report.status {
            changed |= binding.status != status;
            binding.status = status;
        }
        if let Some(step) = &report.step {
            changed |= &binding.step != step;
            binding.step.clone_from(step);
        }
        if let Some(progress) = report.progress {
            let progress = progress.min(100);
            changed |= binding.progress != progress;
            binding.progress = progress;
        }
        changed
    }
}
