use ledger_logging::{ledger_debug, ledger_info, ledger_warn};

use crate::{
    page_id_from_file, AppState, Effect, JobCache, JobId, LocalJobRecord, Msg, PageId, PollPhase,
    RemoteError, SaveApplied, SavedRows, StatusReport, StatusStep, TimerKey, AUTOSAVE_DEBOUNCE_MS,
    FEED_POLL_INTERVAL_MS, JOB_POLL_INTERVAL_MS,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::Tick { now } => {
            state.now = state.now.max(now);
            let mut effects = Vec::new();
            for key in state.scheduler.take_due(state.now) {
                match key {
                    TimerKey::Autosave(page) => effects.extend(persist(&mut state, &page)),
                    TimerKey::JobPoll => effects.extend(poll_tick(&mut state)),
                    TimerKey::FeedPoll => effects.extend(feed_tick(&mut state)),
                }
            }
            effects
        }
        Msg::JobCacheLoaded(records) => {
            state.cache = JobCache::from_records(records);
            state.mark_dirty();
            Vec::new()
        }
        Msg::JobCacheReconciled(result) => match result {
            Ok(reconciled) => {
                ledger_debug!(
                    "Job list refreshed kept={} dropped={}",
                    reconciled.records.len(),
                    reconciled.dropped.len()
                );
                if state.cache.merge_reconciled(reconciled) {
                    state.mark_dirty();
                }
                vec![persist_cache(&state)]
            }
            Err(err) => remote_failure(&mut state, "Could not refresh the job list", err),
        },
        Msg::JobCreated(record) => {
            state.cache.upsert(record);
            state.mark_dirty();
            vec![persist_cache(&state)]
        }
        Msg::OpenJob { job_id } => {
            let mut effects = flush_all(&mut state);
            if state.saves.in_flight_count() > 0 {
                ledger_debug!(
                    "OpenJob job_id={} waits for {} in-flight saves",
                    job_id,
                    state.saves.in_flight_count()
                );
                state.pending_open = Some(job_id);
            } else {
                effects.extend(open_job(&mut state, job_id));
            }
            effects
        }
        Msg::StartJobClicked => match state.tracker.job_id() {
            Some(job_id) => vec![Effect::StartJob {
                job_id: job_id.to_string(),
            }],
            None => Vec::new(),
        },
        Msg::JobStarted { job_id, result } => on_job_started(&mut state, job_id, result),
        Msg::StatusReceived {
            job_id,
            generation,
            result,
        } => on_status(&mut state, job_id, generation, result),
        Msg::ResultsLoaded { job_id, result } => {
            if !state.tracker.is_active(&job_id) {
                return (state, Vec::new());
            }
            match result {
                Ok(results) => {
                    state.pages = results.pages.iter().map(|p| page_id_from_file(p)).collect();
                    state.summary = Some(results.summary);
                    state.saves.clear_pages();
                    state.bounds.clear();
                    state.active_page = None;
                    state.mark_dirty();
                    ledger_info!(
                        "Results loaded job_id={} pages={}",
                        job_id,
                        state.pages.len()
                    );
                    match state.pages.first().cloned() {
                        Some(first) => select_page(&mut state, first),
                        None => Vec::new(),
                    }
                }
                Err(err) => remote_failure(&mut state, "Could not load results", err),
            }
        }
        Msg::PageSelected { page } => {
            if state.pages.contains(&page) {
                select_page(&mut state, page)
            } else {
                Vec::new()
            }
        }
        Msg::PageRowsLoaded {
            job_id,
            page,
            result,
        } => {
            if !state.tracker.is_active(&job_id) {
                return (state, Vec::new());
            }
            match result {
                Ok(rows) => {
                    if state.saves.is_loaded(&page) {
                        // Local rows already exist and may carry edits.
                        ledger_debug!("Ignoring late rows for loaded page {}", page);
                    } else {
                        state.saves.load_rows(&page, rows);
                        state.mark_dirty();
                    }
                    Vec::new()
                }
                Err(err) => remote_failure(&mut state, "Could not load page rows", err),
            }
        }
        Msg::RowBoundsLoaded {
            job_id,
            page,
            result,
        } => {
            if state.tracker.is_active(&job_id) {
                match result {
                    Ok(bounds) => {
                        state.bounds.insert(page, bounds);
                        state.mark_dirty();
                    }
                    // Overlay only; the page stays usable without it.
                    Err(err) => ledger_warn!("Row bounds for {} unavailable: {}", page, err),
                }
            }
            Vec::new()
        }
        Msg::CellEdited {
            page,
            row_id,
            field,
            value,
        } => {
            if state.saves.edit_cell(&page, &row_id, field, value) {
                state.mark_dirty();
                queue_save(&mut state, &page);
            }
            Vec::new()
        }
        Msg::RowAppended { page } => match state.saves.append_row(&page) {
            Some(row_id) => {
                state.saves.select(&page, Some(row_id));
                state.mark_dirty();
                save_now(&mut state, &page)
            }
            None => Vec::new(),
        },
        Msg::RowDeleted { page, row_id } => {
            if state.saves.delete_row(&page, &row_id) {
                state.mark_dirty();
                save_now(&mut state, &page)
            } else {
                Vec::new()
            }
        }
        Msg::RowsReversed { page } => {
            if state.saves.reverse(&page) {
                state.mark_dirty();
                save_now(&mut state, &page)
            } else {
                Vec::new()
            }
        }
        Msg::RowSelected { row_id } => {
            if let Some(page) = state.active_page.clone() {
                state.saves.select(&page, row_id);
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::FlushSaves => flush_all(&mut state),
        Msg::RowsSaved {
            job_id,
            page,
            token,
            result,
        } => {
            let mut effects = on_rows_saved(&mut state, &job_id, &page, token, result);
            if state.saves.in_flight_count() == 0 {
                if let Some(next) = state.pending_open.take() {
                    effects.extend(open_job(&mut state, next));
                }
            }
            effects
        }
        Msg::FeedOpened => {
            state.feed.set_active(true);
            state
                .scheduler
                .schedule(TimerKey::FeedPoll, state.now + FEED_POLL_INTERVAL_MS);
            state.mark_dirty();
            let request = state.feed.first_page();
            vec![Effect::FetchFeedPage {
                request,
                generation: state.feed.generation(),
            }]
        }
        Msg::FeedClosed => {
            state.feed.set_active(false);
            state.scheduler.cancel(&TimerKey::FeedPoll);
            Vec::new()
        }
        Msg::FeedLoadMore => match state.feed.next_page() {
            Some(request) => {
                state.mark_dirty();
                vec![Effect::FetchFeedPage {
                    request,
                    generation: state.feed.generation(),
                }]
            }
            None => Vec::new(),
        },
        Msg::FeedPageLoaded {
            generation,
            offset,
            result,
        } => match result {
            Ok(page) => {
                if state.feed.apply_page(generation, offset, page) {
                    state.mark_dirty();
                } else {
                    ledger_debug!(
                        "Dropping feed page offset={} from generation {}",
                        offset,
                        generation
                    );
                }
                Vec::new()
            }
            Err(err) => {
                if state.feed.load_failed(generation) {
                    remote_failure(&mut state, "Could not load attachments", err)
                } else {
                    ledger_debug!("Ignoring failed feed page from generation {}", generation);
                    Vec::new()
                }
            }
        },
        Msg::BeginProcessClicked { attachment_id } => {
            if state.feed.begin_process(&attachment_id) {
                state.mark_dirty();
                vec![Effect::BeginProcess { attachment_id }]
            } else {
                Vec::new()
            }
        }
        Msg::ProcessBegun {
            attachment_id,
            result,
        } => match result {
            Ok(job_id) => {
                ledger_info!(
                    "Processing attachment {} as job {}",
                    attachment_id,
                    job_id
                );
                state.feed.confirm_process(&attachment_id, job_id.clone());
                let file_name = state
                    .feed
                    .records()
                    .iter()
                    .find(|record| record.attachment_id == attachment_id)
                    .map(|record| record.filename.clone())
                    .unwrap_or_else(|| format!("{attachment_id}.pdf"));
                state
                    .cache
                    .upsert(LocalJobRecord::new(job_id, file_name, state.now));
                state.mark_dirty();
                vec![persist_cache(&state)]
            }
            Err(err) => {
                state.feed.rollback_process(&attachment_id);
                remote_failure(&mut state, "Could not start processing", err)
            }
        },
        Msg::BindingStatusReceived {
            attachment_id,
            job_id,
            result,
        } => {
            match result {
                Ok(report) => {
                    if state.feed.merge_status(&attachment_id, &job_id, &report) {
                        state.mark_dirty();
                    }
                }
                Err(err) => {
                    ledger_debug!(
                        "Binding poll for {} (job {}) failed: {}",
                        attachment_id,
                        job_id,
                        err
                    );
                }
            }
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn persist_cache(state: &AppState) -> Effect {
    Effect::PersistJobCache {
        records: state.cache.records().to_vec(),
    }
}

/// Reports a failed user-facing request. A lost session also asks for login.
fn remote_failure(state: &mut AppState, context: &str, err: RemoteError) -> Vec<Effect> {
    ledger_warn!("{}: {}", context, err);
    state.report_error(format!("{context}: {err}"));
    if err.is_unauthorized() {
        state.auth_required = true;
        vec![Effect::RequireAuthentication]
    } else {
        Vec::new()
    }
}

fn queue_save(state: &mut AppState, page: &str) {
    state.saves.mark_queued(page);
    state.scheduler.schedule(
        TimerKey::Autosave(page.to_string()),
        state.now + AUTOSAVE_DEBOUNCE_MS,
    );
}

/// Structural edits skip the debounce window.
fn save_now(state: &mut AppState, page: &str) -> Vec<Effect> {
    state
        .scheduler
        .cancel(&TimerKey::Autosave(page.to_string()));
    persist(state, page)
}

fn persist(state: &mut AppState, page: &str) -> Vec<Effect> {
    let Some(job_id) = state.saves.job_id().map(ToOwned::to_owned) else {
        return Vec::new();
    };
    match state.saves.begin_save(page) {
        Some((token, rows)) => {
            ledger_debug!(
                "SaveRows job_id={} page={} token={} rows={}",
                job_id,
                page,
                token,
                rows.len()
            );
            vec![Effect::SaveRows {
                job_id,
                page: page.to_string(),
                token,
                rows,
            }]
        }
        None => Vec::new(),
    }
}

fn flush_all(state: &mut AppState) -> Vec<Effect> {
    let mut effects = Vec::new();
    for page in state.scheduler.pending_autosaves() {
        state.scheduler.cancel(&TimerKey::Autosave(page.clone()));
        effects.extend(persist(state, &page));
    }
    effects
}

fn on_rows_saved(
    state: &mut AppState,
    job_id: &str,
    page: &str,
    token: u64,
    result: Result<SavedRows, RemoteError>,
) -> Vec<Effect> {
    match state.saves.finish_save(job_id, page, token, result) {
        SaveApplied::Stale => {
            ledger_debug!("Discarding stale save page={} token={}", page, token);
            Vec::new()
        }
        SaveApplied::Failed(err) => remote_failure(state, "Save failed", err),
        SaveApplied::InPlace { summary } | SaveApplied::Replaced { summary } => {
            if let Some(summary) = summary {
                state.summary = Some(summary);
            }
            state.mark_dirty();
            Vec::new()
        }
    }
}

fn open_job(state: &mut AppState, job_id: JobId) -> Vec<Effect> {
    state.scheduler.cancel(&TimerKey::JobPoll);
    for page in state.scheduler.pending_autosaves() {
        state.scheduler.cancel(&TimerKey::Autosave(page));
    }
    state.saves.reset(Some(job_id.clone()));
    state.pages.clear();
    state.active_page = None;
    state.bounds.clear();
    state.summary = None;
    state.results_requested = false;
    state.notice = None;

    let known = state.cache.get(&job_id).map(LocalJobRecord::snapshot);
    let generation = state.tracker.activate(job_id.clone(), known);
    if state.tracker.phase() == PollPhase::Polling {
        state
            .scheduler
            .schedule(TimerKey::JobPoll, state.now + JOB_POLL_INTERVAL_MS);
    }
    ledger_info!(
        "OpenJob job_id={} generation={} phase={:?}",
        job_id,
        generation,
        state.tracker.phase()
    );
    state.mark_dirty();
    vec![Effect::FetchJobStatus { job_id, generation }]
}

fn poll_tick(state: &mut AppState) -> Vec<Effect> {
    if state.tracker.phase() != PollPhase::Polling {
        return Vec::new();
    }
    let Some(job_id) = state.tracker.job_id().map(ToOwned::to_owned) else {
        return Vec::new();
    };
    state
        .scheduler
        .schedule(TimerKey::JobPoll, state.now + JOB_POLL_INTERVAL_MS);
    vec![Effect::FetchJobStatus {
        job_id,
        generation: state.tracker.generation(),
    }]
}

fn on_job_started(
    state: &mut AppState,
    job_id: JobId,
    result: Result<bool, RemoteError>,
) -> Vec<Effect> {
    if !state.tracker.is_active(&job_id) {
        return Vec::new();
    }
    match result {
        Ok(true) => {
            state.report_info("Processing started");
            state.scheduler.cancel(&TimerKey::JobPoll);
            let generation = state.tracker.restart(true);
            state
                .scheduler
                .schedule(TimerKey::JobPoll, state.now + JOB_POLL_INTERVAL_MS);
            vec![Effect::FetchJobStatus { job_id, generation }]
        }
        Ok(false) => {
            // Not (re)started by this call; one extra check shows where it is.
            let generation = if state.tracker.phase() == PollPhase::Polling {
                state.tracker.generation()
            } else {
                state.tracker.restart(false)
            };
            vec![Effect::FetchJobStatus { job_id, generation }]
        }
        Err(err) => remote_failure(state, "Could not start job", err),
    }
}

fn on_status(
    state: &mut AppState,
    job_id: JobId,
    generation: u64,
    result: Result<StatusReport, RemoteError>,
) -> Vec<Effect> {
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            if !state.tracker.fail(&job_id, generation) {
                return Vec::new();
            }
            state.scheduler.cancel(&TimerKey::JobPoll);
            return remote_failure(state, "Status check failed", err);
        }
    };

    let step = state.tracker.apply(&job_id, generation, &report);
    if step == StatusStep::Ignored {
        ledger_debug!(
            "Ignoring status for job_id={} generation={}",
            job_id,
            generation
        );
        return Vec::new();
    }

    let mut effects = Vec::new();
    if state.cache.apply_report(&job_id, &report) {
        effects.push(persist_cache(state));
    }

    match step {
        StatusStep::Ignored => {}
        StatusStep::Continue { changed } => {
            if state.tracker.phase() == PollPhase::Polling
                && !state.scheduler.is_active(&TimerKey::JobPoll)
            {
                ledger_debug!("Job {} still running; polling resumes", job_id);
                state
                    .scheduler
                    .schedule(TimerKey::JobPoll, state.now + JOB_POLL_INTERVAL_MS);
                state.mark_dirty();
            }
            if changed {
                state.mark_dirty();
            }
        }
        StatusStep::Completed => {
            state.scheduler.cancel(&TimerKey::JobPoll);
            state.mark_dirty();
            if !state.results_requested {
                state.results_requested = true;
                ledger_info!("Job {} completed; loading results", job_id);
                effects.push(Effect::LoadResults { job_id });
            }
        }
        StatusStep::Failed { message } => {
            state.scheduler.cancel(&TimerKey::JobPoll);
            ledger_warn!("Job {} failed: {}", job_id, message);
            state.report_error(format!("Processing failed: {message}"));
        }
    }
    effects
}

fn select_page(state: &mut AppState, page: PageId) -> Vec<Effect> {
    let Some(job_id) = state.tracker.job_id().map(ToOwned::to_owned) else {
        return Vec::new();
    };
    state.active_page = Some(page.clone());
    state.mark_dirty();
    let mut effects = Vec::new();
    if !state.saves.is_loaded(&page) {
        effects.push(Effect::LoadPageRows {
            job_id: job_id.clone(),
            page: page.clone(),
        });
    }
    if !state.bounds.contains_key(&page) {
        effects.push(Effect::LoadRowBounds { job_id, page });
    }
    effects
}

fn feed_tick(state: &mut AppState) -> Vec<Effect> {
    if !state.feed.is_active() {
        return Vec::new();
    }
    state
        .scheduler
        .schedule(TimerKey::FeedPoll, state.now + FEED_POLL_INTERVAL_MS);
    state
        .feed
        .poll_targets()
        .into_iter()
        .map(|(attachment_id, job_id)| Effect::FetchBindingStatus {
            attachment_id,
            job_id,
        })
        .collect()
}
