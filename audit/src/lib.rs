//! # Audit Log
//!
//! Bounded, structured audit trail for the simulation.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not printf-style. The core appends
//! entries; how they are displayed or exported is a subscriber concern the
//! core knows nothing about.
//!
//! The ring keeps only the most recent entries (100 by default). Sequence
//! numbers keep increasing across evictions, so consumers can detect gaps.

pub mod throughput;

pub use throughput::ThroughputCounter;

use core_types::{Instant, Pid};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// How many entries the ring retains by default.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Severity of an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    /// Returns the severity name as it appears in exported logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who an audit entry is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOrigin {
    /// The kernel itself (channel creation, lifecycle events)
    System,
    /// A virtual process
    Process(Pid),
}

impl fmt::Display for LogOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogOrigin::System => write!(f, "SYSTEM"),
            LogOrigin::Process(pid) => write!(f, "{}", pid),
        }
    }
}

/// A single audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonically increasing sequence number
    pub seq: u64,
    /// When the entry was recorded
    pub timestamp: Instant,
    /// Originating process, or the system sentinel
    pub origin: LogOrigin,
    /// Operation name (`WRITE_PIPE`, `CREATE_CHANNEL`, ...)
    pub operation: String,
    /// Human-readable detail
    pub detail: String,
    /// Severity level
    pub severity: Severity,
}

/// Subscriber interface for audit entries
///
/// Every appended entry is pushed to all registered sinks. Sinks must not
/// call back into the component that owns the ring.
pub trait LogSink: Send + Sync {
    fn on_entry(&self, entry: &LogEntry);
}

/// Bounded ring of the most recent audit entries
#[derive(Debug, Clone)]
pub struct LogRing {
    capacity: usize,
    next_seq: u64,
    entries: VecDeque<LogEntry>,
}

impl LogRing {
    /// Creates a ring with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Creates a ring retaining at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            next_seq: 1,
            entries: VecDeque::new(),
        }
    }

    /// Appends an entry, evicting the oldest when full
    ///
    /// Returns a clone of the stored entry so the caller can fan it out to
    /// sinks without holding a borrow on the ring.
    pub fn append(
        &mut self,
        timestamp: Instant,
        origin: LogOrigin,
        operation: impl Into<String>,
        detail: impl Into<String>,
        severity: Severity,
    ) -> LogEntry {
        let entry = LogEntry {
            seq: self.next_seq,
            timestamp,
            origin,
            operation: operation.into(),
            detail: detail.into(),
            severity,
        };
        self.next_seq += 1;

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        entry
    }

    /// Iterates entries oldest to newest
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Returns up to `n` entries, newest first
    pub fn recent(&self, n: usize) -> Vec<&LogEntry> {
        self.entries.iter().rev().take(n).collect()
    }

    /// Returns the number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the ring is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the retention capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn append_info(ring: &mut LogRing, detail: &str) -> LogEntry {
        ring.append(
            Instant::ZERO,
            LogOrigin::System,
            "TEST",
            detail,
            Severity::Info,
        )
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Info < Severity::Warn);
        assert!(Severity::Warn < Severity::Error);
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(format!("{}", LogOrigin::System), "SYSTEM");
        assert_eq!(
            format!("{}", LogOrigin::Process(Pid::from_raw(1000))),
            "Pid(1000)"
        );
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut ring = LogRing::with_capacity(3);
        for i in 0..5 {
            append_info(&mut ring, &format!("entry-{}", i));
        }

        assert_eq!(ring.len(), 3);
        let details: Vec<_> = ring.entries().map(|e| e.detail.as_str()).collect();
        assert_eq!(details, vec!["entry-2", "entry-3", "entry-4"]);
    }

    #[test]
    fn test_seq_monotone_across_eviction() {
        let mut ring = LogRing::with_capacity(2);
        for i in 0..4 {
            let entry = append_info(&mut ring, &format!("e{}", i));
            assert_eq!(entry.seq, i + 1);
        }

        let seqs: Vec<_> = ring.entries().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut ring = LogRing::new();
        append_info(&mut ring, "old");
        append_info(&mut ring, "mid");
        append_info(&mut ring, "new");

        let recent = ring.recent(2);
        assert_eq!(recent[0].detail, "new");
        assert_eq!(recent[1].detail, "mid");
    }

    struct CollectingSink {
        seen: Mutex<Vec<u64>>,
    }

    impl LogSink for CollectingSink {
        fn on_entry(&self, entry: &LogEntry) {
            self.seen.lock().unwrap().push(entry.seq);
        }
    }

    #[test]
    fn test_sink_receives_appended_entry() {
        let sink = CollectingSink {
            seen: Mutex::new(Vec::new()),
        };
        let mut ring = LogRing::new();
        let entry = append_info(&mut ring, "ping");
        sink.on_entry(&entry);

        assert_eq!(*sink.seen.lock().unwrap(), vec![entry.seq]);
    }

    #[test]
    fn test_entry_serialization() {
        let mut ring = LogRing::new();
        let entry = append_info(&mut ring, "exported");
        let json = serde_json::to_string(&entry).unwrap();
        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, back);
    }
}
