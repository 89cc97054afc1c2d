//! Editable page rows and the save-token bookkeeping behind autosave.
use std::collections::{BTreeMap, BTreeSet};

use crate::balance::balance_mismatches;
use crate::job::JobId;
use crate::results::{RemoteError, SavedRows, Summary};
use crate::row::{assign_row_ids, normalize_rows, PageId, Row, RowField};

pub type SaveToken = u64;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct PageRows {
    rows: Vec<Row>,
    token: SaveToken,
    mismatches: BTreeSet<String>,
    /// Bumped whenever the sequence is replaced wholesale.
    revision: u64,
}

impl PageRows {
    fn recompute(&mut self) {
        self.mismatches = balance_mismatches(&self.rows);
    }
}

/// What a save response did to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveApplied {
    /// A newer save owns the page, or the job changed; response dropped.
    Stale,
    Failed(RemoteError),
    /// Same identities in the same order: values copied in place.
    InPlace { summary: Option<Summary> },
    /// Identities changed: the sequence was replaced.
    Replaced { summary: Option<Summary> },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveController {
    job_id: Option<JobId>,
    pages: BTreeMap<PageId, PageRows>,
    in_flight: BTreeSet<(PageId, SaveToken)>,
    selected: Option<(PageId, String)>,
}

impl SaveController {
    /// Forgets every page; tokens restart for the new job.
    pub fn reset(&mut self, job_id: Option<JobId>) {
        self.job_id = job_id;
        self.pages.clear();
        self.in_flight.clear();
        self.selected = None;
    }

    /// Drops cached rows but keeps the job and outstanding saves.
    pub fn clear_pages(&mut self) {
        self.pages.clear();
        self.selected = None;
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn is_loaded(&self, page: &str) -> bool {
        self.pages.contains_key(page)
    }

    pub fn rows(&self, page: &str) -> Option<&[Row]> {
        self.pages.get(page).map(|p| p.rows.as_slice())
    }

    pub fn mismatches(&self, page: &str) -> Option<&BTreeSet<String>> {
        self.pages.get(page).map(|p| &p.mismatches)
    }

    pub fn revision(&self, page: &str) -> u64 {
        self.pages.get(page).map_or(0, |p| p.revision)
    }

    pub fn token(&self, page: &str) -> SaveToken {
        self.pages.get(page).map_or(0, |p| p.token)
    }

    /// Selected `(page, row_id)`.
    pub fn selected(&self) -> Option<(&str, &str)> {
        self.selected
            .as_ref()
            .map(|(page, row_id)| (page.as_str(), row_id.as_str()))
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn load_rows(&mut self, page: &str, rows: Vec<Row>) {
        let entry = self.pages.entry(page.to_string()).or_default();
        entry.rows = rows;
        entry.revision += 1;
        entry.recompute();
    }

    pub fn edit_cell(&mut self, page: &str, row_id: &str, field: RowField, value: String) -> bool {
        let Some(entry) = self.pages.get_mut(page) else {
            return false;
        };
        let Some(row) = entry.rows.iter_mut().find(|row| row.row_id == row_id) else {
            return false;
        };
        if row.get(field) == value {
            return false;
        }
        row.set(field, value);
        entry.recompute();
        true
    }

    /// Appends a blank row and returns its freshly assigned id.
    pub fn append_row(&mut self, page: &str) -> Option<String> {
        let entry = self.pages.get_mut(page)?;
        entry.rows.push(Row::default());
        assign_row_ids(&mut entry.rows);
        entry.revision += 1;
        entry.recompute();
        entry.rows.last().map(|row| row.row_id.clone())
    }

    pub fn delete_row(&mut self, page: &str, row_id: &str) -> bool {
        let Some(entry) = self.pages.get_mut(page) else {
            return false;
        };
        let before = entry.rows.len();
        entry.rows.retain(|row| row.row_id != row_id);
        if entry.rows.len() == before {
            return false;
        }
        entry.revision += 1;
        entry.recompute();
        if self.selected() == Some((page, row_id)) {
            self.selected = None;
        }
        true
    }

    pub fn reverse(&mut self, page: &str) -> bool {
        let Some(entry) = self.pages.get_mut(page) else {
            return false;
        };
        entry.rows.reverse();
        entry.revision += 1;
        entry.recompute();
        true
    }

    pub fn select(&mut self, page: &str, row_id: Option<String>) {
        self.selected = row_id.map(|row_id| (page.to_string(), row_id));
    }

    /// Records that a save for `page` is pending. Responses to saves already
    /// in flight become stale, so they cannot overwrite the newer edit.
    pub fn mark_queued(&mut self, page: &str) {
        if let Some(entry) = self.pages.get_mut(page) {
            entry.token += 1;
        }
    }

    /// Normalizes the page in memory, takes a new token and returns what to
    /// send. `None` when the page holds no rows yet.
    pub fn begin_save(&mut self, page: &str) -> Option<(SaveToken, Vec<Row>)> {
        let entry = self.pages.get_mut(page)?;
        normalize_rows(&mut entry.rows);
        entry.recompute();
        entry.token += 1;
        let token = entry.token;
        self.in_flight.insert((page.to_string(), token));
        Some((token, entry.rows.clone()))
    }

    /// Applies a save response if `token` is still the page's current token.
    pub fn finish_save(
        &mut self,
        job_id: &str,
        page: &str,
        token: SaveToken,
        result: Result<SavedRows, RemoteError>,
    ) -> SaveApplied {
        if self.job_id.as_deref() != Some(job_id) {
            return SaveApplied::Stale;
        }
        self.in_flight.remove(&(page.to_string(), token));
        let Some(entry) = self.pages.get_mut(page) else {
            return SaveApplied::Stale;
        };
        if entry.token != token {
            return SaveApplied::Stale;
        }

        let saved = match result {
            Ok(saved) => saved,
            Err(err) => return SaveApplied::Failed(err),
        };

        let aligned = saved.rows.len() == entry.rows.len()
            && saved
                .rows
                .iter()
                .zip(entry.rows.iter())
                .all(|(incoming, current)| incoming.row_id == current.row_id);
        let applied = if aligned {
            for (current, incoming) in entry.rows.iter_mut().zip(saved.rows.iter()) {
                current.copy_values_from(incoming);
            }
            SaveApplied::InPlace {
                summary: saved.summary,
            }
        } else {
            entry.rows = saved.rows;
            entry.revision += 1;
            SaveApplied::Replaced {
                summary: saved.summary,
            }
        };
        entry.recompute();

        if let Some((selected_page, selected_row)) = &self.selected {
            if selected_page == page && !entry.rows.iter().any(|row| &row.row_id == selected_row) {
                self.selected = None;
            }
        }
        applied
    }
}
