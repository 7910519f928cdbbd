//! The persistence sink boundary. This crate owns queueing and batching;
//! actual storage (a database, a file, anything) is the caller's concern.
//! `InMemorySink` is a reference implementation good enough for tests and
//! for callers that don't need durability.

use crate::error::JournalError;
use crate::model::{HistoryEntry, HistoryFilter, HistoryPage, SortField};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn commit_batch(&self, entries: Vec<HistoryEntry>) -> Result<(), JournalError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<HistoryEntry>, JournalError>;
    async fn delete(&self, id: Uuid) -> Result<bool, JournalError>;
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, JournalError>;
    async fn update_metadata(
        &self,
        id: Uuid,
        tags: Option<Value>,
        notes: Option<String>,
    ) -> Result<bool, JournalError>;
    async fn query(&self, filter: HistoryFilter) -> Result<HistoryPage, JournalError>;
}

#[derive(Default)]
pub struct InMemorySink {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(entry: &HistoryEntry, filter: &HistoryFilter) -> bool {
    if !filter.tool_types.is_empty() && !filter.tool_types.contains(&entry.tool_type) {
        return false;
    }
    if let Some(success) = filter.success {
        if entry.success != success {
            return false;
        }
    }
    if let Some(since) = filter.since {
        if entry.timestamp_utc < since {
            return false;
        }
    }
    if let Some(until) = filter.until {
        if entry.timestamp_utc > until {
            return false;
        }
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let haystack = format!(
            "{} {} {}",
            entry.target,
            entry.tool_type,
            entry.error_message.as_deref().unwrap_or("")
        )
        .to_lowercase();
        if !haystack.contains(&needle) {
            return false;
        }
    }
    true
}

fn cmp_entries(a: &HistoryEntry, b: &HistoryEntry, sort: SortField) -> Ordering {
    match sort {
        SortField::Timestamp => a.timestamp_utc.cmp(&b.timestamp_utc),
        SortField::Duration => a.duration_ms.cmp(&b.duration_ms),
        SortField::Tool => a.tool_type.cmp(&b.tool_type),
        SortField::Target => a.target.cmp(&b.target),
        SortField::Status => a.success.cmp(&b.success),
    }
}

#[async_trait]
impl HistorySink for InMemorySink {
    async fn commit_batch(&self, entries: Vec<HistoryEntry>) -> Result<(), JournalError> {
        self.entries.lock().extend(entries);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<HistoryEntry>, JournalError> {
        Ok(self.entries.lock().iter().find(|e| e.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, JournalError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() != before)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, JournalError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.timestamp_utc >= cutoff);
        Ok((before - entries.len()) as u64)
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        tags: Option<Value>,
        notes: Option<String>,
    ) -> Result<bool, JournalError> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.tags_json = tags;
            entry.notes = notes.map(|n| {
                if n.len() > crate::model::NOTES_MAX {
                    n[..crate::model::NOTES_MAX].to_string()
                } else {
                    n
                }
            });
            entry.updated_utc = Utc::now();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn query(&self, filter: HistoryFilter) -> Result<HistoryPage, JournalError> {
        let entries = self.entries.lock();
        let mut matching: Vec<HistoryEntry> =
            entries.iter().filter(|e| matches(e, &filter)).cloned().collect();
        matching.sort_by(|a, b| {
            let ord = cmp_entries(a, b, filter.sort);
            if filter.descending {
                ord.reverse()
            } else {
                ord
            }
        });
        let total = matching.len();
        let page_size = filter.page_size.max(1);
        let start = filter.page.saturating_mul(page_size).min(total);
        let end = (start + page_size).min(total);
        Ok(HistoryPage {
            entries: matching[start..end].to_vec(),
            total,
        })
    }
}
