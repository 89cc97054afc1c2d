//! Ledger engine: backend client, job cache persistence and the event loop
//! that executes core effects.
mod client;
mod persist;
mod reconcile;
mod runner;
mod session;
mod types;

pub use client::{Backend, BackendSettings, ReqwestBackend, SESSION_COOKIE};
pub use persist::{
    ensure_cache_dir, AtomicFileWriter, FileJobCacheStore, JobCacheStore, MemoryJobCacheStore,
    PersistError,
};
pub use reconcile::{reconcile_job_cache, reconcile_records, ReconcileOutcome};
pub use runner::{execute, EffectRunner};
pub use session::Session;
pub use types::{ApiError, FailureKind};
