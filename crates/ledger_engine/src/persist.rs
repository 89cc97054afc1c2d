use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ledger_core::{LocalJobRecord, JOB_CACHE_LIMIT};
use ledger_logging::{ledger_info, ledger_warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cache directory missing or not writable: {0}")]
    CacheDir(String),
    #[error("could not encode job cache: {0}")]
    Encode(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the cache directory exists; create if missing.
pub fn ensure_cache_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::CacheDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::CacheDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::CacheDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes `{dir}/{filename}` through a temp file and a rename.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_cache_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Where the local job list lives between runs.
pub trait JobCacheStore: Send + Sync {
    /// Missing or unreadable state loads as an empty list.
    fn load(&self) -> Vec<LocalJobRecord>;

    fn save(&self, records: &[LocalJobRecord]) -> Result<(), PersistError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedCache {
    #[serde(default)]
    jobs: Vec<LocalJobRecord>,
}

/// RON file `{dir}/{storage_key}.ron`.
pub struct FileJobCacheStore {
    dir: PathBuf,
    filename: String,
}

impl FileJobCacheStore {
    pub fn new(dir: PathBuf, storage_key: &str) -> Self {
        Self {
            dir,
            filename: format!("{storage_key}.ron"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }
}

impl JobCacheStore for FileJobCacheStore {
    fn load(&self) -> Vec<LocalJobRecord> {
        let path = self.path();
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                ledger_warn!("Failed to read job cache from {:?}: {}", path, err);
                return Vec::new();
            }
        };

        let state: PersistedCache = match ron::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                ledger_warn!("Failed to parse job cache from {:?}: {}", path, err);
                return Vec::new();
            }
        };

        let mut jobs = state.jobs;
        jobs.truncate(JOB_CACHE_LIMIT);
        ledger_info!("Loaded {} cached jobs from {:?}", jobs.len(), path);
        jobs
    }

    fn save(&self, records: &[LocalJobRecord]) -> Result<(), PersistError> {
        let state = PersistedCache {
            jobs: records.iter().take(JOB_CACHE_LIMIT).cloned().collect(),
        };
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(&state, pretty)
            .map_err(|err| PersistError::Encode(err.to_string()))?;
        AtomicFileWriter::new(self.dir.clone()).write(&self.filename, &content)?;
        Ok(())
    }
}

/// Keeps the list in memory only.
#[derive(Debug, Default)]
pub struct MemoryJobCacheStore {
    records: Mutex<Vec<LocalJobRecord>>,
}

impl MemoryJobCacheStore {
    pub fn new(records: Vec<LocalJobRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn snapshot(&self) -> Vec<LocalJobRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl JobCacheStore for MemoryJobCacheStore {
    fn load(&self) -> Vec<LocalJobRecord> {
        self.snapshot()
    }

    fn save(&self, records: &[LocalJobRecord]) -> Result<(), PersistError> {
        if let Ok(mut stored) = self.records.lock() {
            *stored = records.to_vec();
        }
        Ok(())
    }
}
