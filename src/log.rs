//! Append-only NDJSON evaluation log.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::evaluator::EvaluationRecord;

const STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Appends one [`EvaluationRecord`] per line to a file.
///
/// Several processes may share the same file: writes hold an exclusive file
/// lock, reads a shared one.
///
/// # Examples
///
/// ```no_run
/// use retrofit_optimizer::log::EvaluationLog;
///
/// let log = EvaluationLog::new("evaluations.ndjson");
/// let records = EvaluationLog::read_records(log.path()).unwrap();
/// ```
#[derive(Debug)]
pub struct EvaluationLog {
    path: PathBuf,
    /// Serialise in-process writes so we only hold the file lock briefly.
    write_lock: Mutex<()>,
}

impl EvaluationLog {
    /// Creates a log writing to `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record` as a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be opened, locked or
    /// written.
    pub fn append(&self, record: &EvaluationRecord) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::Storage(e.to_string()))?;

        file.lock_exclusive()
            .map_err(|e| Error::Storage(e.to_string()))?;

        let line = serde_json::to_string(record).map_err(|e| Error::Storage(e.to_string()))?;

        writeln!(file, "{line}").map_err(|e| Error::Storage(e.to_string()))?;
        file.flush().map_err(|e| Error::Storage(e.to_string()))?;

        FileExt::unlock(&file).map_err(|e| Error::Storage(e.to_string()))?;

        Ok(())
    }

    /// Reads every record from an NDJSON log. A missing file yields an
    /// empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file exists but cannot be read or a
    /// line fails to parse.
    pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<EvaluationRecord>> {
        let file = match File::open(path.as_ref()) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Storage(e.to_string())),
        };

        FileExt::lock_shared(&file).map_err(|e| Error::Storage(e.to_string()))?;

        let reader = BufReader::new(&file);
        let mut records = Vec::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| Error::Storage(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: EvaluationRecord = serde_json::from_str(line)
                .map_err(|e| Error::Storage(format!("line {}: {e}", lineno + 1)))?;
            records.push(record);
        }

        FileExt::unlock(&file).map_err(|e| Error::Storage(e.to_string()))?;

        Ok(records)
    }
}

/// Formats a timestamp the way run labels and evaluation ids embed it.
#[must_use]
pub fn stamp(at: DateTime<Utc>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

/// Builds a run label such as `nsga_20250814-153012`.
#[must_use]
pub fn run_label(prefix: &str) -> String {
    format!("{prefix}_{}", stamp(Utc::now()))
}

/// Builds a per-evaluation id such as `opt_20250814-153012_9f3a61c2`.
#[must_use]
pub fn evaluation_id() -> String {
    format!("opt_{}_{:08x}", stamp(Utc::now()), fastrand::u32(..))
}
