// fleetmux-core/src/runtime/logtail.rs
// ============================================================================
// Module: Log Tail Tracker
// Description: Session-scoped incremental reads of append-only logs.
// Purpose: Return only newly appended lines on each poll.
// Dependencies: fleetmux-core interfaces
// ============================================================================

//! ## Overview
//! The tracker keeps one byte offset per (session, log) pair in the
//! [`SessionStore`]. A first poll, an explicit reset, or a zero offset
//! returns the last [`TAIL_LINES`] lines and anchors the offset at the
//! current end of file; subsequent polls return only the bytes appended
//! since. A stored offset beyond the current file size means the log was
//! truncated or rotated; the tracker treats that as uninitialized and
//! performs a full reset rather than returning nothing forever.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::core::error::DispatchError;
use crate::core::identifiers::SessionId;
use crate::interfaces::SessionStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of trailing lines returned by a reset poll.
pub const TAIL_LINES: usize = 100;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Log tail tracker errors.
#[derive(Debug, Error)]
pub enum LogTailError {
    /// The log file could not be opened or read.
    #[error("log read failed: {path}: {message}")]
    Io {
        /// Log file path.
        path: String,
        /// Error details.
        message: String,
    },
}

impl From<LogTailError> for DispatchError {
    fn from(err: LogTailError) -> Self {
        Self::OperationFailure {
            message: err.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Session-scoped incremental log reader.
pub struct LogTailTracker {
    /// Offset store keyed by (session, log identity).
    store: Arc<dyn SessionStore>,
}

impl LogTailTracker {
    /// Builds a tracker over the given session store.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
        }
    }

    /// Polls the log for lines appended since the last poll.
    ///
    /// With no stored offset, an explicit `reset`, a zero offset, or an
    /// offset past the current end of file, returns the last [`TAIL_LINES`]
    /// lines and re-anchors at the end of file. Otherwise returns exactly
    /// the lines appended since the stored offset. The stored offset only
    /// ever moves forward, except through the reset path.
    ///
    /// # Errors
    ///
    /// Returns [`LogTailError`] when the log cannot be opened or read.
    pub fn poll(
        &self,
        session: &SessionId,
        log_path: &Path,
        reset: bool,
    ) -> Result<Vec<String>, LogTailError> {
        let key = log_path.to_string_lossy().to_string();
        let end = file_size(log_path)?;
        let stored = self.store.offset(session, &key).unwrap_or(0);

        if reset || stored == 0 || stored > end {
            let lines = read_last_lines(log_path, TAIL_LINES)?;
            self.store.set_offset(session, &key, end);
            return Ok(lines);
        }

        let lines = read_from_offset(log_path, stored)?;
        self.store.set_offset(session, &key, end);
        Ok(lines)
    }
}

// ============================================================================
// SECTION: File Helpers
// ============================================================================

/// Returns the current size of the log file.
fn file_size(path: &Path) -> Result<u64, LogTailError> {
    std::fs::metadata(path).map(|meta| meta.len()).map_err(|err| LogTailError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Reads the last `count` lines of the log.
fn read_last_lines(path: &Path, count: usize) -> Result<Vec<String>, LogTailError> {
    let file = open(path)?;
    let mut window = std::collections::VecDeque::with_capacity(count);
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| LogTailError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        if window.len() == count {
            window.pop_front();
        }
        window.push_back(line);
    }
    Ok(window.into_iter().collect())
}

/// Reads all complete lines from `offset` to the end of file.
fn read_from_offset(path: &Path, offset: u64) -> Result<Vec<String>, LogTailError> {
    let mut file = open(path)?;
    file.seek(SeekFrom::Start(offset)).map_err(|err| LogTailError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| LogTailError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        lines.push(line);
    }
    Ok(lines)
}

/// Opens the log file for reading.
fn open(path: &Path) -> Result<File, LogTailError> {
    File::open(path).map_err(|err| LogTailError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}
