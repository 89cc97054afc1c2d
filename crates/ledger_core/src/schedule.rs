//! Virtual-clock timers.
//!
//! The core never sleeps. Timers are deadlines in milliseconds; the driver
//! advances time with `Msg::Tick` and due timers fire inside `update`.
use std::collections::BTreeMap;

use crate::row::PageId;

pub type Millis = u64;

/// Quiet window before an edited page is saved.
pub const AUTOSAVE_DEBOUNCE_MS: Millis = 220;
/// Interval between job status polls.
pub const JOB_POLL_INTERVAL_MS: Millis = 2_000;
/// Interval between background polls of feed bindings.
pub const FEED_POLL_INTERVAL_MS: Millis = 2_500;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimerKey {
    Autosave(PageId),
    JobPoll,
    FeedPoll,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scheduler {
    deadlines: BTreeMap<TimerKey, Millis>,
}

impl Scheduler {
    /// Arms `key` for `at`, replacing any earlier deadline. Returns true when
    /// an existing timer was rescheduled.
    pub fn schedule(&mut self, key: TimerKey, at: Millis) -> bool {
        self.deadlines.insert(key, at).is_some()
    }

    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        self.deadlines.remove(key).is_some()
    }

    pub fn is_active(&self, key: &TimerKey) -> bool {
        self.deadlines.contains_key(key)
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.deadlines.values().min().copied()
    }

    /// Removes and returns every timer due at `now`, earliest first.
    pub fn take_due(&mut self, now: Millis) -> Vec<TimerKey> {
        let mut due: Vec<(Millis, TimerKey)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(key, at)| (*at, key.clone()))
            .collect();
        due.sort();
        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }

    /// Pages with a pending debounced save.
    pub fn pending_autosaves(&self) -> Vec<PageId> {
        self.deadlines
            .keys()
            .filter_map(|key| match key {
                TimerKey::Autosave(page) => Some(page.clone()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reschedule_replaces_deadline() {
        let mut scheduler = Scheduler::default();
        let key = TimerKey::Autosave("page_001".into());
        assert!(!scheduler.schedule(key.clone(), 220));
        assert!(scheduler.schedule(key.clone(), 300));
        assert!(scheduler.take_due(299).is_empty());
        assert_eq!(scheduler.take_due(300), vec![key.clone()]);
        assert!(!scheduler.is_active(&key));
    }

    #[test]
    fn due_timers_fire_in_deadline_order() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(TimerKey::FeedPoll, 50);
        scheduler.schedule(TimerKey::JobPoll, 10);
        scheduler.schedule(TimerKey::Autosave("p".into()), 500);
        assert_eq!(scheduler.next_deadline(), Some(10));
        assert_eq!(
            scheduler.take_due(100),
            vec![TimerKey::JobPoll, TimerKey::FeedPoll]
        );
        assert_eq!(scheduler.pending_autosaves(), vec!["p".to_string()]);
    }
}
