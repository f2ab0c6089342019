use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use wiremock::{Match, Request};

/// One request seen by the embedded server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub method: String,
    /// Path plus query
    pub url: String,
    pub received_at: DateTime<Utc>,
}

/// Ring buffer of the most recent requests; the oldest entry is evicted
/// once `capacity` is reached
#[derive(Debug)]
pub struct RequestJournal {
    capacity: usize,
    entries: Mutex<VecDeque<JournalEntry>>,
}

impl RequestJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, entry: JournalEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Oldest first
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Records every request it is asked about and never matches.
///
/// Mounted at the highest priority so wiremock consults it first for each
/// incoming request.
pub(super) struct JournalTap(pub(super) Arc<RequestJournal>);

impl Match for JournalTap {
    fn matches(&self, request: &Request) -> bool {
        let url = match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        };
        self.0.record(JournalEntry {
            method: request.method.as_str().to_string(),
            url,
            received_at: Utc::now(),
        });
        false
    }
}
