//! The correlation store: durable, idempotent, trace-indexed.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;

use crate::config::StoreConfig;
use crate::context::TraceId;
use crate::events::LogEvent;
use crate::observability::metrics;
use crate::store::identity::EventId;
use crate::store::index::EventIndex;
use crate::store::journal::Journal;
use crate::store::query::{EventFilter, Page, PageRequest, PageToken, StoreStats, TraceSummary};

/// Errors surfaced by inserts and queries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("journal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid page token: {0:?}")]
    InvalidPageToken(String),

    #[error("invalid time range: since {since} is after until {until}")]
    InvalidTimeRange {
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    },
}

/// Result of inserting one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The identity was already stored; nothing changed.
    Duplicate,
}

/// Totals of a batch insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub duplicates: usize,
}

#[derive(Debug, Default)]
struct Inner {
    index: EventIndex,
    duplicates: u64,
}

/// Cloneable handle to a shared store.
///
/// Writers take the index lock exclusively for the whole journal append
/// plus index update, so readers only ever see fully inserted events.
#[derive(Debug, Clone)]
pub struct CorrelationStore {
    inner: Arc<RwLock<Inner>>,
    journal: Option<Arc<Mutex<Journal>>>,
    default_page_size: usize,
    max_page_size: usize,
}

impl CorrelationStore {
    /// Open the store, replaying the journal when one is configured.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut store = Self::with_page_sizes(config.default_page_size, config.max_page_size);
        if let Some(path) = &config.journal_path {
            let (journal, events) = Journal::open(PathBuf::from(path))?;
            {
                let mut inner = store.inner.write();
                for event in events {
                    let id = EventId::of(&event);
                    if !inner.index.contains(&id) {
                        inner.index.insert(id, event);
                    }
                }
            }
            store.journal = Some(Arc::new(Mutex::new(journal)));
        }
        Ok(store)
    }

    /// Store without a journal.
    pub fn in_memory() -> Self {
        let defaults = StoreConfig::default();
        Self::with_page_sizes(defaults.default_page_size, defaults.max_page_size)
    }

    fn with_page_sizes(default_page_size: usize, max_page_size: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            journal: None,
            default_page_size: default_page_size.max(1),
            max_page_size: max_page_size.max(1),
        }
    }

    /// Insert one event; re-inserting a stored identity is a no-op.
    pub fn insert(&self, event: LogEvent) -> Result<InsertOutcome, StoreError> {
        let id = EventId::of(&event);
        let mut inner = self.inner.write();
        if inner.index.contains(&id) {
            inner.duplicates += 1;
            metrics::record_store_insert("duplicate");
            return Ok(InsertOutcome::Duplicate);
        }
        if let Some(journal) = &self.journal {
            journal.lock().append(&event)?;
        }
        inner.index.insert(id, event);
        metrics::record_store_insert("inserted");
        Ok(InsertOutcome::Inserted)
    }

    pub fn insert_batch(
        &self,
        events: impl IntoIterator<Item = LogEvent>,
    ) -> Result<BatchOutcome, StoreError> {
        let mut outcome = BatchOutcome::default();
        for event in events {
            match self.insert(event)? {
                InsertOutcome::Inserted => outcome.inserted += 1,
                InsertOutcome::Duplicate => outcome.duplicates += 1,
            }
        }
        Ok(outcome)
    }

    /// Every event of a trace, in `(timestamp, insertion)` order.
    pub fn query_trace(&self, trace_id: &TraceId, page: &PageRequest) -> Result<Page<LogEvent>, StoreError> {
        let (after, limit) = self.paging(page)?;
        let inner = self.inner.read();
        let positions = inner.index.trace(trace_id);
        Ok(inner
            .index
            .scan(positions, after, &Default::default(), None, limit))
    }

    /// Events matching `filter`, in `(timestamp, insertion)` order.
    pub fn query_events(&self, filter: &EventFilter, page: &PageRequest) -> Result<Page<LogEvent>, StoreError> {
        let (after, limit) = self.paging(page)?;
        let inner = self.inner.read();
        let index = &inner.index;
        // Narrowest available index drives the scan; the filter checks the rest.
        let positions = match (filter.level, filter.service.as_deref()) {
            (Some(level), Some(service)) => {
                let by_level = index.level(level);
                let by_service = index.service(service);
                if by_level.len() <= by_service.len() {
                    by_level
                } else {
                    by_service
                }
            }
            (Some(level), None) => index.level(level),
            (None, Some(service)) => index.service(service),
            (None, None) => index.all(),
        };
        Ok(index.scan(positions, after, &filter.range, Some(filter), limit))
    }

    pub fn trace_summary(&self, trace_id: &TraceId) -> Option<TraceSummary> {
        self.inner.read().index.summarize(trace_id)
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            events: inner.index.len(),
            traces: inner.index.trace_count(),
            duplicates: inner.duplicates,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn paging(&self, page: &PageRequest) -> Result<(Option<PageToken>, usize), StoreError> {
        let after = page
            .page_token
            .as_deref()
            .map(str::parse::<PageToken>)
            .transpose()?;
        let limit = page
            .limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        Ok((after, limit))
    }
}
