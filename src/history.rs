use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How many searches are remembered.
pub const MAX_ENTRIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub result_count: usize,
}

/// Recent searches, most recent first, no two with the same query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchHistory {
    entries: Vec<HistoryEntry>,
}

impl SearchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a search. Re-issuing a query moves it to the front with
    /// fresh metadata; blank queries are ignored.
    pub fn record(
        &mut self,
        query: &str,
        result_count: usize,
        now: DateTime<Utc>,
    ) {
        if query.trim().is_empty() {
            return;
        }
        self.entries.retain(|entry| entry.query != query);
        self.entries.insert(
            0,
            HistoryEntry {
                query: query.to_string(),
                timestamp: now,
                result_count,
            },
        );
        self.entries.truncate(MAX_ENTRIES);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
