//! Single-threaded event loop around the core state machine.
//!
//! The session owns the [`AppState`], maps virtual deadlines onto tokio time
//! and routes effects: remote ones to the [`EffectRunner`], local ones to the
//! job cache store.
use std::sync::Arc;
use std::time::Duration;

use ledger_core::{update, AppState, AppViewModel, Effect, Millis, Msg, RemoteError};
use ledger_logging::{ledger_debug, ledger_error, ledger_warn};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::{reconcile_records, Backend, EffectRunner, JobCacheStore};

/// Milliseconds since `epoch_ms` at the moment the session was created.
#[derive(Debug, Clone, Copy)]
struct SessionClock {
    origin: Instant,
    epoch_ms: Millis,
}

impl SessionClock {
    fn now(&self) -> Millis {
        self.epoch_ms + self.origin.elapsed().as_millis() as Millis
    }

    fn instant_at(&self, at: Millis) -> Instant {
        self.origin + Duration::from_millis(at.saturating_sub(self.epoch_ms))
    }
}

pub struct Session {
    state: AppState,
    backend: Arc<dyn Backend>,
    runner: EffectRunner,
    store: Arc<dyn JobCacheStore>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    clock: SessionClock,
}

impl Session {
    /// `epoch_ms` is wall-clock time at creation; virtual time continues from
    /// it so records created by the core carry real timestamps.
    pub fn new(
        state: AppState,
        backend: Arc<dyn Backend>,
        store: Arc<dyn JobCacheStore>,
        epoch_ms: Millis,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            state,
            runner: EffectRunner::new(backend.clone(), msg_tx.clone()),
            backend,
            store,
            msg_tx,
            msg_rx,
            clock: SessionClock {
                origin: Instant::now(),
                epoch_ms,
            },
        }
    }

    /// Sender for messages from outside the loop (user input, startup tasks).
    pub fn sender(&self) -> mpsc::UnboundedSender<Msg> {
        self.msg_tx.clone()
    }

    /// Restores the persisted job list immediately and refreshes it against
    /// the backend in a spawned task. The refresh result comes back as
    /// [`Msg::JobCacheReconciled`] and is merged into whatever the list holds
    /// by then. Must be called inside a tokio runtime.
    pub fn restore_job_cache(&mut self) {
        let records = self.store.load();
        self.dispatch(Msg::JobCacheLoaded(records.clone()));

        let backend = self.backend.clone();
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let result = reconcile_records(backend.as_ref(), records)
                .await
                .map_err(RemoteError::from);
            let _ = msg_tx.send(Msg::JobCacheReconciled(result));
        });
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn view(&self) -> AppViewModel {
        self.state.view()
    }

    pub fn now(&self) -> Millis {
        self.clock.now()
    }

    /// Returns whether a render is due and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        self.state.consume_dirty()
    }

    /// Advances the clock, then applies `msg`.
    pub fn dispatch(&mut self, msg: Msg) {
        if !matches!(msg, Msg::Tick { .. }) {
            let now = self.clock.now();
            self.apply(Msg::Tick { now });
        }
        self.apply(msg);
    }

    fn apply(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        for effect in self.runner.run(effects) {
            self.handle_local(effect);
        }
    }

    fn handle_local(&mut self, effect: Effect) {
        match effect {
            Effect::PersistJobCache { records } => {
                if let Err(err) = self.store.save(&records) {
                    ledger_error!("Failed to persist job cache: {}", err);
                }
            }
            Effect::RequireAuthentication => {
                ledger_warn!("Session rejected by the backend; sign in again");
            }
            remote => ledger_debug!("Remote effect reached local handling: {:?}", remote),
        }
    }

    /// Waits for the next message or the next timer deadline, whichever comes
    /// first, and applies it.
    pub async fn step(&mut self) {
        let deadline = self
            .state
            .next_deadline()
            .map(|at| self.clock.instant_at(at));
        let msg = match deadline {
            Some(at) => {
                tokio::select! {
                    msg = self.msg_rx.recv() => msg,
                    () = tokio::time::sleep_until(at) => Some(Msg::Tick { now: self.clock.now() }),
                }
            }
            None => self.msg_rx.recv().await,
        };
        if let Some(msg) = msg {
            self.dispatch(msg);
        }
    }

    /// Runs the loop until `done` holds. Returns false if `limit` elapsed
    /// first.
    pub async fn run_until<F>(&mut self, mut done: F, limit: Duration) -> bool
    where
        F: FnMut(&AppState) -> bool,
    {
        let give_up = Instant::now() + limit;
        while !done(&self.state) {
            if tokio::time::timeout_at(give_up, self.step()).await.is_err() {
                return false;
            }
        }
        true
    }
}
