#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::utils::{read_json, write_json_pretty};
use dashmap::DashMap;
use mgdm2oereb_types::JobRecord;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key-value store of job records. Writes to one id are serialized; a read after a write to
/// the same id sees that write.
pub trait JobStore: Send + Sync {
    fn add(&self, record: JobRecord) -> Result<(), AppError>;

    /// Apply `change` to the stored record and persist it; returns the new record.
    fn update(
        &self,
        id: &str,
        change: &mut dyn FnMut(&mut JobRecord),
    ) -> Result<JobRecord, AppError>;

    fn get(&self, id: &str) -> Result<Option<JobRecord>, AppError>;

    fn list(&self) -> Result<Vec<JobRecord>, AppError>;

    /// `false` when nothing was stored under `id`.
    fn remove(&self, id: &str) -> Result<bool, AppError>;
}

pub(crate) fn not_found(id: &str) -> AppError {
    AppError::new(ErrorCategory::StoreError, format!("job '{}' not found", id)).with_code("JOB-002")
}

fn duplicate(id: &str) -> AppError {
    AppError::new(
        ErrorCategory::StoreError,
        format!("job '{}' already exists", id),
    )
    .with_code("JOB-003")
}

/// Job ids end up in file names, so only a conservative alphabet is accepted.
pub fn validate_job_id(id: &str) -> Result<(), AppError> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(AppError::new(
            ErrorCategory::ConfigurationError,
            format!("'{}' is not a valid job id", id),
        )
        .with_code("JOB-001"))
    }
}

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: DashMap<String, JobRecord>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn add(&self, record: JobRecord) -> Result<(), AppError> {
        validate_job_id(&record.identifier)?;
        match self.records.entry(record.identifier.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(duplicate(&record.identifier)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    fn update(
        &self,
        id: &str,
        change: &mut dyn FnMut(&mut JobRecord),
    ) -> Result<JobRecord, AppError> {
        let mut entry = self.records.get_mut(id).ok_or_else(|| not_found(id))?;
        change(entry.value_mut());
        Ok(entry.value().clone())
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, AppError> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    fn list(&self) -> Result<Vec<JobRecord>, AppError> {
        Ok(self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn remove(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.records.remove(id).is_some())
    }
}

/// One pretty JSON document per job under `dir`, replaced atomically on every write.
#[derive(Debug)]
pub struct FileJobStore {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl FileJobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| {
            AppError::new(
                ErrorCategory::StoreError,
                format!("failed to create job store {}: {}", dir.display(), err),
            )
            .with_code("JOB-004")
        })?;
        Ok(FileJobStore {
            dir,
            locks: DashMap::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn with_lock<T>(
        &self,
        id: &str,
        body: impl FnOnce() -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let lock = self.lock_for(id);
        let result = {
            let _held = lock.lock().map_err(|_| {
                AppError::new(
                    ErrorCategory::StoreError,
                    format!("lock for job '{}' is poisoned", id),
                )
                .with_code("JOB-005")
            })?;
            body()
        };
        drop(lock);
        // Only the map still holds the mutex: nobody is inside or waiting for this id.
        self.locks
            .remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }
}

impl JobStore for FileJobStore {
    fn add(&self, record: JobRecord) -> Result<(), AppError> {
        validate_job_id(&record.identifier)?;
        let id = record.identifier.clone();
        self.with_lock(&id, || {
            let path = self.record_path(&id);
            if path.exists() {
                return Err(duplicate(&id));
            }
            write_json_pretty(&path, &record)
        })
    }

    fn update(
        &self,
        id: &str,
        change: &mut dyn FnMut(&mut JobRecord),
    ) -> Result<JobRecord, AppError> {
        validate_job_id(id)?;
        self.with_lock(id, || {
            let path = self.record_path(id);
            if !path.exists() {
                return Err(not_found(id));
            }
            let mut record: JobRecord = read_json(&path)?;
            change(&mut record);
            write_json_pretty(&path, &record)?;
            Ok(record)
        })
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, AppError> {
        if validate_job_id(id).is_err() {
            return Ok(None);
        }
        self.with_lock(id, || {
            let path = self.record_path(id);
            if !path.exists() {
                return Ok(None);
            }
            read_json(&path).map(Some)
        })
    }

    fn list(&self) -> Result<Vec<JobRecord>, AppError> {
        let entries = fs::read_dir(&self.dir).map_err(|err| {
            AppError::new(
                ErrorCategory::StoreError,
                format!("failed to list {}: {}", self.dir.display(), err),
            )
            .with_code("JOB-004")
        })?;

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_record = path.extension().and_then(|ext| ext.to_str()) == Some("json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }
            match read_json::<JobRecord>(&path) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable job record")
                }
            }
        }
        Ok(records)
    }

    fn remove(&self, id: &str) -> Result<bool, AppError> {
        if validate_job_id(id).is_err() {
            return Ok(false);
        }
        self.with_lock(id, || {
            let path = self.record_path(id);
            if !path.exists() {
                return Ok(false);
            }
            fs::remove_file(&path).map_err(|err| {
                AppError::new(
                    ErrorCategory::StoreError,
                    format!("failed to remove {}: {}", path.display(), err),
                )
                .with_code("JOB-004")
            })?;
            Ok(true)
        })
    }
}
