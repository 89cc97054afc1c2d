use std::sync::Arc;

use futures_util::future;
use ledger_core::{Effect, JobResults, Msg, RemoteError, Summary};
use ledger_logging::{ledger_debug, ledger_info, ledger_warn};
use tokio::sync::mpsc;

use crate::Backend;

/// Executes remote effects as spawned tasks. Each task reports back with
/// exactly one message on `msg_tx`.
pub struct EffectRunner {
    backend: Arc<dyn Backend>,
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl EffectRunner {
    pub fn new(backend: Arc<dyn Backend>, msg_tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self { backend, msg_tx }
    }

    /// Spawns every remote effect and hands local ones back to the caller.
    /// Must be called inside a tokio runtime.
    pub fn run(&self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut local = Vec::new();
        for effect in effects {
            if effect.is_remote() {
                self.spawn(effect);
            } else {
                local.push(effect);
            }
        }
        local
    }

    fn spawn(&self, effect: Effect) {
        let backend = self.backend.clone();
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            if let Some(msg) = execute(backend.as_ref(), effect).await {
                // The session is gone when the receiver is dropped.
                let _ = msg_tx.send(msg);
            }
        });
    }
}

/// Performs one remote effect and turns the answer into the message the core
/// expects. Local effects yield `None`.
pub async fn execute(backend: &dyn Backend, effect: Effect) -> Option<Msg> {
    let msg = match effect {
        Effect::FetchJobStatus { job_id, generation } => {
            let result = backend.job_status(&job_id).await.map_err(RemoteError::from);
            Msg::StatusReceived {
                job_id,
                generation,
                result,
            }
        }
        Effect::StartJob { job_id } => {
            ledger_info!("StartJob job_id={}", job_id);
            let result = backend.start_job(&job_id).await.map_err(RemoteError::from);
            Msg::JobStarted { job_id, result }
        }
        Effect::LoadResults { job_id } => {
            let (pages, summary) =
                future::join(backend.cleaned_pages(&job_id), backend.summary(&job_id)).await;
            let result = match (pages, summary) {
                (Ok(pages), Ok(summary)) => Ok(JobResults { pages, summary }),
                (Ok(pages), Err(err)) if err.is_not_found() => {
                    ledger_debug!("No summary yet for job {}", job_id);
                    Ok(JobResults {
                        pages,
                        summary: Summary::default(),
                    })
                }
                (Err(err), _) | (_, Err(err)) => Err(RemoteError::from(err)),
            };
            Msg::ResultsLoaded { job_id, result }
        }
        Effect::LoadPageRows { job_id, page } => {
            let result = backend
                .page_rows(&job_id, &page)
                .await
                .map_err(RemoteError::from);
            Msg::PageRowsLoaded {
                job_id,
                page,
                result,
            }
        }
        Effect::LoadRowBounds { job_id, page } => {
            let result = backend
                .row_bounds(&job_id, &page)
                .await
                .map_err(RemoteError::from);
            Msg::RowBoundsLoaded {
                job_id,
                page,
                result,
            }
        }
        Effect::SaveRows {
            job_id,
            page,
            token,
            rows,
        } => {
            let result = backend
                .save_page_rows(&job_id, &page, &rows)
                .await
                .map_err(RemoteError::from);
            if let Err(err) = &result {
                ledger_warn!("Save failed job_id={} page={}: {}", job_id, page, err);
            }
            Msg::RowsSaved {
                job_id,
                page,
                token,
                result,
            }
        }
        Effect::FetchFeedPage {
            request,
            generation,
        } => {
            let result = backend.feed_page(request).await.map_err(RemoteError::from);
            Msg::FeedPageLoaded {
                generation,
                offset: request.offset,
                result,
            }
        }
        Effect::BeginProcess { attachment_id } => {
            let result = backend
                .begin_process(&attachment_id)
                .await
                .map_err(RemoteError::from);
            Msg::ProcessBegun {
                attachment_id,
                result,
            }
        }
        Effect::FetchBindingStatus {
            attachment_id,
            job_id,
        } => {
            let result = backend.job_status(&job_id).await.map_err(RemoteError::from);
            Msg::BindingStatusReceived {
                attachment_id,
                job_id,
                result,
            }
        }
        Effect::PersistJobCache { .. } | Effect::RequireAuthentication => return None,
    };
    Some(msg)
}
