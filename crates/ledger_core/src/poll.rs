use crate::job::{JobId, JobSnapshot, StatusReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    /// No job open.
    #[default]
    Idle,
    /// Timer armed; a fetch is issued every interval.
    Polling,
    /// One status fetch outstanding, no timer. A non-terminal answer turns
    /// this into `Polling`.
    Checking,
    /// Terminal status seen; nothing more is fetched.
    Finished,
    /// A fetch failed; the job must be re-opened to resume.
    Stopped,
}

/// What a status response means for the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusStep {
    /// From an earlier activation or after the loop ended.
    Ignored,
    Continue { changed: bool },
    Completed,
    Failed { message: String },
}

/// Status of the job currently open in the review view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobTracker {
    job_id: Option<JobId>,
    generation: u64,
    phase: PollPhase,
    snapshot: JobSnapshot,
}

impl JobTracker {
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn snapshot(&self) -> &JobSnapshot {
        &self.snapshot
    }

    pub fn is_active(&self, job_id: &str) -> bool {
        self.job_id.as_deref() == Some(job_id)
    }

    /// Opens `job_id`, seeded with whatever the local cache knew. Returns the
    /// new generation; responses tagged with older generations are ignored.
    pub fn activate(&mut self, job_id: JobId, known: Option<JobSnapshot>) -> u64 {
        self.generation += 1;
        self.job_id = Some(job_id);
        self.snapshot = known.unwrap_or_default();
        self.phase = if self.snapshot.status.is_terminal() {
            PollPhase::Checking
        } else {
            PollPhase::Polling
        };
        self.generation
    }

    /// Starts a fresh activation for the open job without resetting what is
    /// shown. `poll` selects a timer-driven loop over a one-off check.
    pub fn restart(&mut self, poll: bool) -> u64 {
        self.generation += 1;
        self.phase = if poll {
            PollPhase::Polling
        } else {
            PollPhase::Checking
        };
        self.generation
    }

    pub fn apply(&mut self, job_id: &str, generation: u64, report: &StatusReport) -> StatusStep {
        if !self.is_active(job_id) || generation != self.generation {
            return StatusStep::Ignored;
        }
        if matches!(
            self.phase,
            PollPhase::Idle | PollPhase::Finished | PollPhase::Stopped
        ) {
            return StatusStep::Ignored;
        }
        let changed = self.snapshot.merge(report);
        let status = self.snapshot.status;
        if status.is_terminal() {
            self.phase = PollPhase::Finished;
            return if status == crate::JobStatus::Completed {
                StatusStep::Completed
            } else {
                let message = self
                    .snapshot
                    .message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| self.snapshot.step.clone());
                StatusStep::Failed { message }
            };
        }
        // The server, not the cached record, decides whether the job runs.
        if self.phase == PollPhase::Checking {
            self.phase = PollPhase::Polling;
        }
        StatusStep::Continue { changed }
    }

    /// A fetch failed. Returns false when the failure belongs to an older
    /// activation and should be ignored.
    pub fn fail(&mut self, job_id: &str, generation: u64) -> bool {
        if !self.is_active(job_id)
            || generation != self.generation
            || !matches!(self.phase, PollPhase::Polling | PollPhase::Checking)
        {
            return false;
        }
        self.phase = PollPhase::Stopped;
        true
    }
}
