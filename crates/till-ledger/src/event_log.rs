//! # Event Log
//!
//! A plain-text, append-only file of operator-facing events: integrity sweep
//! results, corrections, startup and shutdown. One event per line:
//!
//! ```text
//! [2026-10-18 14:30:05] integrity sweep: 0 violation(s)
//! [2026-10-18 14:31:12] void sale 42 by alice, authorized by sam: Customer changed mind
//! ```
//!
//! Structured diagnostics still go through `tracing`; this file is for
//! whoever reads the till's history without a log viewer.

use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        EventLog {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one event stamped with the current time.
    pub fn record(&self, event: &str) -> io::Result<()> {
        self.record_at(Utc::now(), event)
    }

    /// Appends one event with an explicit timestamp.
    pub fn record_at(&self, at: DateTime<Utc>, event: &str) -> io::Result<()> {
        self.record_all_at(at, &[event])
    }

    /// Appends several events under one timestamp in a single write.
    pub fn record_all_at<S: AsRef<str>>(&self, at: DateTime<Utc>, events: &[S]) -> io::Result<()> {
        let lines: String = events.iter().map(|e| format_entry(at, e.as_ref())).collect();

        // A poisoned lock only means another writer panicked mid-line.
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(lines.as_bytes())
    }

    /// Appends events from async code, with the file I/O on the blocking pool.
    /// Failures are only logged.
    pub async fn note_all(&self, events: Vec<String>) {
        let log = self.clone();
        let written = tokio::task::spawn_blocking(move || log.record_all_at(Utc::now(), &events)).await;

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(path = %self.path.display(), error = %e, "Failed to write event log"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Event log writer task failed"),
        }
    }

    /// Like [`record`](Self::record), but a write failure is only logged.
    pub fn note(&self, event: &str) {
        if let Err(e) = self.record(event) {
            warn!(path = %self.path.display(), error = %e, "Failed to write event log");
        }
    }
}

/// `[YYYY-MM-DD HH:MM:SS] event\n`, with embedded newlines flattened.
pub fn format_entry(at: DateTime<Utc>, event: &str) -> String {
    let event = event.replace(['\r', '\n'], " ");
    format!("[{}] {}\n", at.format(TIMESTAMP_FORMAT), event)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_entry() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 14, 30, 5).unwrap();
        assert_eq!(
            format_entry(at, "integrity sweep: 0 violation(s)"),
            "[2026-10-18 14:30:05] integrity sweep: 0 violation(s)\n"
        );
        assert_eq!(format_entry(at, "two\nlines"), "[2026-10-18 14:30:05] two lines\n");
    }

    #[test]
    fn test_appends_lines() {
        let dir = std::env::temp_dir().join(format!("till-events-{}", uuid::Uuid::new_v4()));
        let log = EventLog::new(dir.join("events.log"));
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();

        log.record_at(at, "ledger opened").unwrap();
        log.record_at(at, "sale 1 voided").unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            contents,
            "[2026-10-18 09:00:00] ledger opened\n[2026-10-18 09:00:00] sale 1 voided\n"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_note_all_writes_from_async_code() {
        let dir = std::env::temp_dir().join(format!("till-events-{}", uuid::Uuid::new_v4()));
        let log = EventLog::new(dir.join("nested").join("events.log"));

        log.note_all(vec!["sweep: 1 violation(s)".to_string(), "  SALE_TOTAL_MISMATCH".to_string()])
            .await;

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] sweep: 1 violation(s)"));
        assert!(lines[1].ends_with("]   SALE_TOTAL_MISMATCH"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
