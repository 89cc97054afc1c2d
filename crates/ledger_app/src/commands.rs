//! Subcommand drivers. Each one builds a [`Session`], feeds it the user's
//! intent as messages and prints the resulting view.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ledger_core::{AppState, AppViewModel, JobStatus, Msg, NoticeLevel, PollPhase};
use ledger_engine::{
    reconcile_job_cache, Backend, FileJobCacheStore, JobCacheStore, ReconcileOutcome,
    ReqwestBackend, Session,
};
use ledger_logging::{ledger_info, ledger_warn};

use crate::config::AppConfig;

pub struct AppContext {
    config: AppConfig,
    backend: Arc<dyn Backend>,
    store: Arc<dyn JobCacheStore>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        let settings = config.backend_settings()?;
        let backend = ReqwestBackend::new(settings).context("building http client")?;
        let store = FileJobCacheStore::new(config.cache_dir.clone(), &config.storage_key);
        Ok(Self {
            config,
            backend: Arc::new(backend),
            store: Arc::new(store),
        })
    }

    /// Seeds a session with the stored job list. Its refresh runs in the
    /// background; a rejected session shows up as `auth_required`.
    fn session(&self, feed_page_size: Option<u32>) -> Session {
        let state = AppState::new().with_feed_options(
            feed_page_size.unwrap_or(self.config.feed_page_size),
            self.config.probe(),
        );
        let epoch_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut session = Session::new(state, self.backend.clone(), self.store.clone(), epoch_ms);
        session.restore_job_cache();
        session
    }
}

pub async fn reconcile(ctx: &AppContext) -> Result<()> {
    match reconcile_job_cache(ctx.backend.as_ref(), ctx.store.as_ref()).await {
        ReconcileOutcome::Updated(records) => {
            if records.is_empty() {
                println!("no cached jobs");
            }
            for record in records {
                let created = chrono::DateTime::from_timestamp_millis(record.created_at as i64)
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{:<24} {:<12} {:>3}%  {:<16} {}  {}",
                    record.job_id,
                    record.status,
                    record.progress,
                    record.step,
                    created,
                    record.file_name
                );
            }
            Ok(())
        }
        ReconcileOutcome::Unauthorized => bail!("session rejected by the backend; sign in again"),
    }
}

/// Follows one job until polling ends and its results are on screen.
pub async fn watch(ctx: &AppContext, job_id: String, start: bool, limit: Duration) -> Result<()> {
    let mut session = ctx.session(None);
    session.dispatch(Msg::OpenJob { job_id });
    if start {
        session.dispatch(Msg::StartJobClicked);
    }

    let mut last_line = String::new();
    let settled = session
        .run_until(
            |state| {
                let view = state.view();
                if let Some(job) = &view.job {
                    let line = format!("{} {} {}%", job.status, job.step, job.progress);
                    if line != last_line {
                        println!("{line}");
                        last_line = line;
                    }
                }
                view.auth_required || watch_settled(state.results_loaded(), &view)
            },
            limit,
        )
        .await;
    if !settled {
        ledger_warn!("Gave up waiting after {:?}", limit);
        bail!("job did not settle within {}s", limit.as_secs());
    }
    // Rows of the first page follow the results.
    session
        .run_until(
            |state| match state.view().active_page {
                Some(page) => state.saves().is_loaded(&page),
                None => true,
            },
            Duration::from_secs(30),
        )
        .await;

    let view = session.view();
    print_review(&view);
    if view.auth_required {
        bail!("session rejected by the backend; sign in again");
    }
    Ok(())
}

fn watch_settled(results_loaded: bool, view: &AppViewModel) -> bool {
    let Some(job) = &view.job else {
        return true;
    };
    let failed = view
        .notice
        .as_ref()
        .is_some_and(|notice| notice.level == NoticeLevel::Error);
    match job.phase {
        PollPhase::Stopped => true,
        PollPhase::Finished if job.status == JobStatus::Completed => results_loaded || failed,
        PollPhase::Finished => true,
        PollPhase::Idle | PollPhase::Polling | PollPhase::Checking => false,
    }
}

fn print_review(view: &AppViewModel) {
    if let Some(notice) = &view.notice {
        println!("[{:?}] {}", notice.level, notice.text);
    }
    let Some(job) = &view.job else {
        return;
    };
    println!(
        "job {} {} ({}, {:?})",
        job.job_id, job.status, job.step, job.parse_mode
    );
    if !view.pages.is_empty() {
        println!("pages: {}", view.pages.join(", "));
    }
    if let Some(summary) = &view.summary {
        for (key, value) in &summary.0 {
            println!("  {key}: {value}");
        }
    }
    if let Some(page) = &view.active_page {
        println!(
            "{page}: {} rows, {} balance mismatches",
            view.row_count, view.mismatch_count
        );
        for row in &view.rows {
            let flag = if row.balance_mismatch { "!" } else { " " };
            println!(
                "{flag} {:<5} {:<10} {:<32} {:>12} {:>12} {:>12}",
                row.row.row_id,
                row.row.date,
                row.row.description,
                row.row.debit,
                row.row.credit,
                row.row.balance
            );
        }
    }
}

pub struct FeedArgs {
    pub limit: Option<u32>,
    pub offset_pages: u32,
    pub process: Option<String>,
    pub wait: Duration,
}

pub async fn feed(ctx: &AppContext, args: FeedArgs) -> Result<()> {
    if let Some(limit) = args.limit {
        ledger_info!("Feed page size overridden to {}", limit);
    }
    let mut session = ctx.session(args.limit);
    session.dispatch(Msg::FeedOpened);
    wait_for_feed(&mut session, args.wait).await?;
    for _ in 0..args.offset_pages {
        if !session.state().feed().has_more() {
            break;
        }
        session.dispatch(Msg::FeedLoadMore);
        wait_for_feed(&mut session, args.wait).await?;
    }

    if let Some(attachment_id) = args.process {
        session.dispatch(Msg::BeginProcessClicked {
            attachment_id: attachment_id.clone(),
        });
        let bound = session
            .run_until(
                |state| {
                    state
                        .feed()
                        .binding(&attachment_id)
                        .map_or(true, |binding| binding.job_id.is_some())
                },
                args.wait,
            )
            .await;
        if !bound {
            bail!("processing {attachment_id} was not confirmed in time");
        }
        match session.state().feed().binding(&attachment_id) {
            Some(binding) => println!(
                "{attachment_id} -> job {}",
                binding.job_id.as_deref().unwrap_or("?")
            ),
            None => bail!("could not start processing {attachment_id}"),
        }
    }

    print_feed(&session.view());
    session.dispatch(Msg::FeedClosed);
    Ok(())
}

async fn wait_for_feed(session: &mut Session, wait: Duration) -> Result<()> {
    let loaded = session
        .run_until(|state| !state.feed().is_loading(), wait)
        .await;
    if !loaded {
        bail!("feed did not load within {}s", wait.as_secs());
    }
    if session.view().auth_required {
        bail!("session rejected by the backend; sign in again");
    }
    Ok(())
}

fn print_feed(view: &AppViewModel) {
    if let Some(notice) = &view.notice {
        println!("[{:?}] {}", notice.level, notice.text);
    }
    for item in &view.feed.items {
        let binding = item
            .binding
            .as_ref()
            .map(|binding| match &binding.job_id {
                Some(job_id) => format!("{job_id} {} {}%", binding.status, binding.progress),
                None => "starting...".to_string(),
            })
            .unwrap_or_default();
        println!(
            "{:<20} {:<28} {:<20} {:<12} {}",
            item.attachment_id, item.filename, item.account_name, item.availability, binding
        );
    }
    if view.feed.has_more {
        println!("(more available)");
    }
}
