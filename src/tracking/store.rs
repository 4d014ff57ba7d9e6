//! Log record stores.
//!
//! The interceptor only ever calls [`LogStore::write`]; a store decides how a
//! record is kept. Stores validate records before accepting them.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::{PersistenceErrorKind, TrackingError};

use super::record::{LogRecord, RecordLimits};

/// Durable storage for log records.
pub trait LogStore: Send + Sync {
    /// Persist one record.
    fn write(&self, record: &LogRecord) -> Result<(), TrackingError>;
}

/// Store that appends records to a file as JSON lines.
///
/// Thread-safe via internal mutex.
pub struct JsonLinesStore {
    /// The file handle wrapped in a mutex for thread safety.
    file: Mutex<File>,
    /// Path to the log file.
    path: PathBuf,
    limits: RecordLimits,
}

impl JsonLinesStore {
    /// Open (or create) the log file at `path` in append mode.
    ///
    /// Creates the parent directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - File cannot be opened for appending
    pub fn new(path: &Path, limits: RecordLimits) -> Result<Self, TrackingError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(path = %parent.display(), "Creating request log directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(path = %path.display(), "Request log store initialized");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
            limits,
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogStore for JsonLinesStore {
    fn write(&self, record: &LogRecord) -> Result<(), TrackingError> {
        record.validate(&self.limits)?;

        let json = serde_json::to_string(record)?;

        let mut file = self.file.lock().map_err(|e| TrackingError::Persistence {
            kind: PersistenceErrorKind::Unavailable {
                message: format!("Failed to acquire request log lock: {}", e),
            },
        })?;

        writeln!(file, "{}", json)?;

        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync request log");
        }

        debug!(
            record_id = %record.id,
            path = %record.path,
            "Request log record written"
        );

        Ok(())
    }
}

/// In-process store that keeps records in memory.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<LogRecord>>,
    limits: RecordLimits,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: RecordLimits) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            limits,
        }
    }

    /// Snapshot of the records written so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.recovered().clone()
    }

    pub fn len(&self) -> usize {
        self.recovered().len()
    }

    /// Records are only ever pushed whole, so a poisoned lock still guards a
    /// consistent list.
    fn recovered(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| {
            warn!("Memory store lock poisoned by a panicked writer, reading recovered records");
            poisoned.into_inner()
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogStore for MemoryStore {
    fn write(&self, record: &LogRecord) -> Result<(), TrackingError> {
        record.validate(&self.limits)?;

        let mut records = self.records.lock().map_err(|e| TrackingError::Persistence {
            kind: PersistenceErrorKind::Unavailable {
                message: format!("Failed to acquire memory store lock: {}", e),
            },
        })?;
        records.push(record.clone());
        Ok(())
    }
}

/// A no-op store for when persistence is unavailable or disabled.
#[derive(Debug, Default)]
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }
}

impl LogStore for NullStore {
    fn write(&self, _record: &LogRecord) -> Result<(), TrackingError> {
        Ok(())
    }
}
