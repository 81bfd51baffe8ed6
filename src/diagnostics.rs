use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// The log keeps this many entries; older ones are evicted oldest-first.
pub const LOG_CAPACITY: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
}

// One timestamped step of a fetch cycle; never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub severity: Severity,
}

/// Bounded append-only ring of fetch events. Written by the fetch cycle,
/// read by the debug panel; never part of control flow.
#[derive(Debug, Default)]
pub struct DiagnosticsLog {
    entries: VecDeque<DiagnosticEntry>,
    next_id: u64,
}

impl DiagnosticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, severity: Severity, message: impl Into<String>) {
        if self.entries.len() == LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(DiagnosticEntry {
            id: self.next_id,
            timestamp: Utc::now(),
            message: message.into(),
            severity,
        });
        self.next_id += 1;
    }

    /// Entries oldest-first to newest-last.
    pub fn entries(&self) -> impl Iterator<Item = &DiagnosticEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
