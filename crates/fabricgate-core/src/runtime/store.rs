// fabricgate-core/src/runtime/store.rs
// ============================================================================
// Module: Fabricgate Filesystem Store
// Description: Atomic per-tenant JSON record storage and append-only JSONL logs.
// Purpose: The sole persistence backend for resources, shares, keys,
//          automations, and event/audit logs.
// Dependencies: std::fs, serde_json
// ============================================================================

//! ## Overview
//! Every write goes through [`write_json_atomic`]: serialize, write to a
//! `.tmp` sibling, `fsync`, then rename over the destination. Readers never
//! observe a partially written file. Every append goes through
//! [`append_jsonl`], which opens in append mode and writes one line per
//! call; lines are never rewritten.

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::error::AsErrorKind;
use crate::core::error::CoreErrorKind;

/// Directory mode applied to every tenant-owned directory.
#[cfg(unix)]
pub const DIR_MODE: u32 = 0o700;
/// File mode applied to every tenant-owned file.
#[cfg(unix)]
pub const FILE_MODE: u32 = 0o600;

/// Errors raised by the filesystem store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record could not be read or written.
    #[error("store io error: {0}")]
    Io(String),
    /// The record could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serde(String),
    /// The requested record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),
}

impl AsErrorKind for StoreError {
    fn kind(&self) -> CoreErrorKind {
        match self {
            Self::Io(_) | Self::Serde(_) => CoreErrorKind::IntegrityError,
            Self::NotFound(_) => CoreErrorKind::NotFound,
        }
    }
}

/// Ensures `dir` exists with [`DIR_MODE`] permissions, creating parents as
/// needed.
///
/// # Errors
/// Returns [`StoreError::Io`] if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|err| StoreError::Io(err.to_string()))?;
    #[cfg(unix)]
    {
        let permissions = fs::Permissions::from_mode(DIR_MODE);
        fs::set_permissions(dir, permissions).map_err(|err| StoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Writes `value` to `path` atomically: serialize, write to `path.tmp`, then
/// rename over `path`. The parent directory must already exist.
///
/// # Errors
/// Returns [`StoreError`] if serialization or either filesystem step fails.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|err| StoreError::Serde(err.to_string()))?;
    let tmp_path = tmp_sibling(path);

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    let mut file = options.open(&tmp_path).map_err(|err| StoreError::Io(err.to_string()))?;
    file.write_all(&bytes).map_err(|err| StoreError::Io(err.to_string()))?;
    file.sync_all().map_err(|err| StoreError::Io(err.to_string()))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|err| StoreError::Io(err.to_string()))?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Reads and deserializes a JSON record, tolerating corruption by returning
/// `Ok(None)` rather than an error (fault-tolerant read path, per the
/// read/write error policy).
///
/// # Errors
/// Returns [`StoreError::Io`] only for I/O failures other than the file not
/// existing.
pub fn read_json_fault_tolerant<T: DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes).ok()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StoreError::Io(err.to_string())),
    }
}

/// Appends one JSON-serialized line to `path`, creating it (with
/// [`FILE_MODE`]) if absent. A process-local lock (see [`FileLocks`])
/// should guard concurrent appenders to the same path.
///
/// # Errors
/// Returns [`StoreError`] if serialization or the append fails.
pub fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut line = serde_json::to_string(value).map_err(|err| StoreError::Serde(err.to_string()))?;
    line.push('\n');

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    let mut file = options.open(path).map_err(|err| StoreError::Io(err.to_string()))?;
    file.write_all(line.as_bytes()).map_err(|err| StoreError::Io(err.to_string()))?;
    Ok(())
}

/// Reads every parseable line of a JSONL file, skipping lines that fail to
/// deserialize (fault-tolerant read path).
///
/// # Errors
/// Returns [`StoreError::Io`] if the file exists but cannot be read, or
/// `Ok(vec![])` if it does not exist.
pub fn read_jsonl_fault_tolerant<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(StoreError::Io(err.to_string())),
    };
    Ok(contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

/// An in-process registry of per-path mutexes, serializing read-modify-write
/// sequences against the same file without a cross-process lock.
#[derive(Default)]
pub struct FileLocks {
    locks: Mutex<std::collections::HashMap<PathBuf, std::sync::Arc<Mutex<()>>>>,
}

impl FileLocks {
    /// Creates an empty lock registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mutex guarding `path`, creating it on first use.
    #[must_use]
    pub fn lock_for(&self, path: &Path) -> std::sync::Arc<Mutex<()>> {
        #[expect(clippy::unwrap_used, reason = "poisoned only if a prior holder panicked")]
        let mut locks = self.locks.lock().unwrap();
        locks.entry(path.to_path_buf()).or_insert_with(|| std::sync::Arc::new(Mutex::new(()))).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_then_read_round_trips() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("record.json");
        write_json_atomic(&path, &serde_json::json!({"a": 1})).expect("write");
        let value: serde_json::Value = read_json_fault_tolerant(&path).expect("read").expect("present");
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[test]
    fn missing_file_reads_as_none_not_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("absent.json");
        let value: Option<serde_json::Value> = read_json_fault_tolerant(&path).expect("read");
        assert!(value.is_none());
    }

    #[test]
    fn corrupt_jsonl_line_is_skipped_not_fatal() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("events.jsonl");
        fs::write(&path, "{\"a\":1}\nnot json\n{\"a\":2}\n").expect("write");
        let values: Vec<serde_json::Value> = read_jsonl_fault_tolerant(&path).expect("read");
        assert_eq!(values, vec![serde_json::json!({"a": 1}), serde_json::json!({"a": 2})]);
    }

    #[test]
    fn append_jsonl_grows_the_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("log.jsonl");
        append_jsonl(&path, &serde_json::json!({"n": 1})).expect("append");
        append_jsonl(&path, &serde_json::json!({"n": 2})).expect("append");
        let values: Vec<serde_json::Value> = read_jsonl_fault_tolerant(&path).expect("read");
        assert_eq!(values.len(), 2);
    }
}
