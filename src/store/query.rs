//! Query shapes, cursors and range scans over the event index.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{SpanId, TraceId};
use crate::events::{Level, LogEvent};
use crate::store::index::{EventIndex, Position};
use crate::store::StoreError;

/// Half-open `[since, until)` window; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn new(since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Result<Self, StoreError> {
        if let (Some(s), Some(u)) = (since, until) {
            if s > u {
                return Err(StoreError::InvalidTimeRange { since: s, until: u });
            }
        }
        Ok(Self { since, until })
    }

    /// The last `window` up to now.
    pub fn last(window: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            since: Some(now - window),
            until: None,
        }
    }

    fn since_micros(&self) -> Option<i64> {
        self.since.map(|t| t.timestamp_micros())
    }

    fn until_micros(&self) -> Option<i64> {
        self.until.map(|t| t.timestamp_micros())
    }
}

/// Event search criteria. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Exact level match.
    pub level: Option<Level>,
    pub service: Option<String>,
    pub range: TimeRange,
}

impl EventFilter {
    pub fn level(level: Level) -> Self {
        Self {
            level: Some(level),
            ..Self::default()
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = range;
        self
    }

    fn matches(&self, event: &LogEvent) -> bool {
        self.level.map_or(true, |l| event.level == l)
            && self.service.as_deref().map_or(true, |s| event.service == s)
    }
}

/// Position of the last event a page returned. Opaque to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageToken(Position);

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}.{:x}", self.0 .0 as u64, self.0 .1)
    }
}

impl FromStr for PageToken {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::InvalidPageToken(s.to_string());
        let (micros, seq) = s.split_once('.').ok_or_else(invalid)?;
        let micros = u64::from_str_radix(micros, 16).map_err(|_| invalid())? as i64;
        let seq = u64::from_str_radix(seq, 16).map_err(|_| invalid())?;
        Ok(Self((micros, seq)))
    }
}

/// Paging parameters of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<usize>,
    pub page_token: Option<String>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            page_token: None,
        }
    }

    /// Continue after `page`, or `None` when it was the last one.
    pub fn next_of<T>(&self, page: &Page<T>) -> Option<Self> {
        page.next_page_token.as_ref().map(|token| Self {
            limit: self.limit,
            page_token: Some(token.clone()),
        })
    }
}

/// One page of results in `(timestamp, insertion)` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub events: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Shape of one stored trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub trace_id: TraceId,
    pub event_count: usize,
    pub services: BTreeSet<String>,
    pub span_count: usize,
    pub root_spans: BTreeSet<SpanId>,
    /// Spans whose parent never logged in this trace.
    pub orphan_spans: BTreeSet<SpanId>,
    pub first_timestamp: DateTime<Utc>,
    pub last_timestamp: DateTime<Utc>,
    pub error_count: usize,
}

/// Store-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub events: usize,
    pub traces: usize,
    pub duplicates: u64,
}

impl EventIndex {
    /// Scan `positions` (sorted) after `after`, inside `range`, keeping events
    /// that satisfy `filter`, and return at most `limit` of them.
    pub(crate) fn scan(
        &self,
        positions: &[Position],
        after: Option<PageToken>,
        range: &TimeRange,
        filter: Option<&EventFilter>,
        limit: usize,
    ) -> Page<LogEvent> {
        let mut start = range
            .since_micros()
            .map_or(0, |since| positions.partition_point(|p| p.0 < since));
        if let Some(PageToken(last)) = after {
            start = start.max(positions.partition_point(|p| *p <= last));
        }
        let until = range.until_micros();

        let mut events = Vec::with_capacity(limit.min(positions.len()));
        let mut last = None;
        let mut more = false;
        for position in &positions[start..] {
            if until.is_some_and(|u| position.0 >= u) {
                break;
            }
            let Some(event) = self.event(*position) else {
                continue;
            };
            if filter.is_some_and(|f| !f.matches(event)) {
                continue;
            }
            if events.len() == limit {
                more = true;
                break;
            }
            events.push(event.clone());
            last = Some(*position);
        }

        Page {
            events,
            next_page_token: last
                .filter(|_| more)
                .map(|position| PageToken(position).to_string()),
        }
    }

    pub(crate) fn summarize(&self, trace_id: &TraceId) -> Option<TraceSummary> {
        let positions = self.trace(trace_id);
        let first = self.event(*positions.first()?)?;
        let last = self.event(*positions.last()?)?;

        let spans = self.spans_of(trace_id);
        let mut services = BTreeSet::new();
        let mut root_spans = BTreeSet::new();
        let mut orphan_spans = BTreeSet::new();
        let mut error_count = 0;
        for event in positions.iter().filter_map(|p| self.event(*p)) {
            services.insert(event.service.clone());
            if event.level == Level::Error {
                error_count += 1;
            }
            match &event.parent_span_id {
                None => {
                    root_spans.insert(event.span_id.clone());
                }
                Some(parent) if !spans.contains(parent) => {
                    orphan_spans.insert(event.span_id.clone());
                }
                Some(_) => {}
            }
        }

        Some(TraceSummary {
            trace_id: trace_id.clone(),
            event_count: positions.len(),
            services,
            span_count: spans.len(),
            root_spans,
            orphan_spans,
            first_timestamp: first.timestamp,
            last_timestamp: last.timestamp,
            error_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_token_parse_back() {
        let token = PageToken((1_700_000_000_123_456, 42));
        let text = token.to_string();
        assert_eq!(text.parse::<PageToken>().unwrap(), token);

        let negative = PageToken((-5, 0));
        assert_eq!(negative.to_string().parse::<PageToken>().unwrap(), negative);
    }

    #[test]
    fn test_page_token_rejects_garbage() {
        for bad in ["", "abc", "zz.1", "1.", "1.2.3"] {
            assert!(
                matches!(bad.parse::<PageToken>(), Err(StoreError::InvalidPageToken(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_time_range_validation() {
        let now = Utc::now();
        assert!(TimeRange::new(Some(now), Some(now - chrono::Duration::seconds(1))).is_err());
        assert!(TimeRange::new(Some(now), Some(now)).is_ok());
        assert!(TimeRange::new(None, Some(now)).is_ok());
    }
}
