// crates/fleetmux-core/tests/logtail.rs
// ============================================================================
// Module: Log Tail Tests
// Description: Incremental log reads against real temporary files.
// Purpose: Verify offset tracking, resets, and truncation recovery.
// Dependencies: fleetmux-core, tempfile
// ============================================================================

//! ## Overview
//! These tests run [`LogTailTracker`] against files in a [`tempfile`]
//! directory, appending and truncating between polls to cover the offset
//! lifecycle end to end.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

mod common;

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use fleetmux_core::InMemorySessionStore;
use fleetmux_core::LogTailTracker;
use fleetmux_core::SessionId;
use fleetmux_core::SessionStore;
use fleetmux_core::TAIL_LINES;
use tempfile::TempDir;

fn tracker() -> LogTailTracker {
    LogTailTracker::new(Arc::new(InMemorySessionStore::new()))
}

fn write_lines(path: &Path, lines: &[&str]) {
    let mut file = File::create(path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

fn append_lines(path: &Path, lines: &[&str]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

fn log_in(dir: &TempDir) -> PathBuf {
    dir.path().join("latest.log")
}

#[test]
fn first_poll_returns_existing_tail() {
    let dir = TempDir::new().unwrap();
    let log = log_in(&dir);
    write_lines(&log, &["one", "two", "three"]);
    let tracker = tracker();
    let session = SessionId::from("s-1");

    let lines = tracker.poll(&session, &log, false).unwrap();
    assert_eq!(lines, vec!["one", "two", "three"]);
}

#[test]
fn second_poll_without_growth_is_empty() {
    let dir = TempDir::new().unwrap();
    let log = log_in(&dir);
    write_lines(&log, &["one", "two"]);
    let tracker = tracker();
    let session = SessionId::from("s-1");

    tracker.poll(&session, &log, false).unwrap();
    let lines = tracker.poll(&session, &log, false).unwrap();
    assert!(lines.is_empty());
}

#[test]
fn appended_bytes_come_back_as_exactly_the_new_lines() {
    let dir = TempDir::new().unwrap();
    let log = log_in(&dir);
    write_lines(&log, &["one", "two"]);
    let tracker = tracker();
    let session = SessionId::from("s-1");

    tracker.poll(&session, &log, false).unwrap();
    append_lines(&log, &["three", "four"]);
    let lines = tracker.poll(&session, &log, false).unwrap();
    assert_eq!(lines, vec!["three", "four"]);
}

#[test]
fn reset_returns_at_most_the_tail_window() {
    let dir = TempDir::new().unwrap();
    let log = log_in(&dir);
    let numbered: Vec<String> = (0..250).map(|n| format!("line {n}")).collect();
    let refs: Vec<&str> = numbered.iter().map(String::as_str).collect();
    write_lines(&log, &refs);
    let tracker = tracker();
    let session = SessionId::from("s-1");

    tracker.poll(&session, &log, false).unwrap();
    let lines = tracker.poll(&session, &log, true).unwrap();
    assert_eq!(lines.len(), TAIL_LINES);
    assert_eq!(lines.first().map(String::as_str), Some("line 150"));
    assert_eq!(lines.last().map(String::as_str), Some("line 249"));
}

#[test]
fn sessions_track_offsets_independently() {
    let dir = TempDir::new().unwrap();
    let log = log_in(&dir);
    write_lines(&log, &["one"]);
    let tracker = tracker();
    let first = SessionId::from("s-1");
    let second = SessionId::from("s-2");

    tracker.poll(&first, &log, false).unwrap();
    append_lines(&log, &["two"]);

    // A session that has never polled starts from the full tail.
    let fresh = tracker.poll(&second, &log, false).unwrap();
    assert_eq!(fresh, vec!["one", "two"]);
    let incremental = tracker.poll(&first, &log, false).unwrap();
    assert_eq!(incremental, vec!["two"]);
}

#[test]
fn truncated_log_triggers_a_full_reset() {
    let dir = TempDir::new().unwrap();
    let log = log_in(&dir);
    write_lines(&log, &["old 1", "old 2", "old 3"]);
    let tracker = tracker();
    let session = SessionId::from("s-1");

    tracker.poll(&session, &log, false).unwrap();
    // Rotation replaces the file with a shorter one; the stored offset now
    // points past the end.
    write_lines(&log, &["new 1"]);
    let lines = tracker.poll(&session, &log, false).unwrap();
    assert_eq!(lines, vec!["new 1"]);

    append_lines(&log, &["new 2"]);
    let lines = tracker.poll(&session, &log, false).unwrap();
    assert_eq!(lines, vec!["new 2"]);
}

#[test]
fn cleared_session_rereads_the_full_tail() {
    let dir = TempDir::new().unwrap();
    let log = log_in(&dir);
    write_lines(&log, &["one", "two", "three"]);
    let store = Arc::new(InMemorySessionStore::new());
    let tracker = LogTailTracker::new(store.clone());
    let session = SessionId::from("s-1");

    assert_eq!(tracker.poll(&session, &log, false).unwrap(), vec!["one", "two", "three"]);
    assert!(tracker.poll(&session, &log, false).unwrap().is_empty());

    // Ending the session drops its offsets, so the next poll starts over.
    store.clear_session(&session);
    assert_eq!(tracker.poll(&session, &log, false).unwrap(), vec!["one", "two", "three"]);
}

#[test]
fn evicted_session_rereads_the_full_tail() {
    let dir = TempDir::new().unwrap();
    let log = log_in(&dir);
    write_lines(&log, &["one", "two"]);
    let store = Arc::new(InMemorySessionStore::with_capacity(1));
    let tracker = LogTailTracker::new(store);
    let first = SessionId::from("s-1");
    let second = SessionId::from("s-2");

    tracker.poll(&first, &log, false).unwrap();
    // A second session pushes the first out of the bounded store.
    tracker.poll(&second, &log, false).unwrap();
    assert_eq!(tracker.poll(&first, &log, false).unwrap(), vec!["one", "two"]);
}

#[test]
fn missing_log_is_an_error_not_a_panic() {
    let dir = TempDir::new().unwrap();
    let log = log_in(&dir);
    let tracker = tracker();
    let session = SessionId::from("s-1");

    assert!(tracker.poll(&session, &log, false).is_err());
}
