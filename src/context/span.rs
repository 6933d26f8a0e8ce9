//! Open-span bookkeeping.
//!
//! # Responsibilities
//! - Track spans that have been opened but not yet closed
//! - Hand expired spans to the sweeper exactly once
//!
//! # Design Decisions
//! - Closing removes the entry, so a span closed by its guard can never be
//!   closed again by the sweeper (and vice versa)
//! - Lock-free reads/writes via DashMap; contention is per shard

use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::context::ids::SpanId;
use crate::context::trace_context::TraceContext;

/// Terminal state of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    Ok,
    Error,
    /// The owning request was cancelled or its guard dropped unfinished.
    Cancelled,
    /// Closed by the sweeper after exceeding its TTL.
    Timeout,
}

impl SpanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatus::Ok => "ok",
            SpanStatus::Error => "error",
            SpanStatus::Cancelled => "cancelled",
            SpanStatus::Timeout => "timeout",
        }
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A span that has not received its completion event yet.
#[derive(Debug, Clone)]
pub struct OpenSpan {
    pub context: TraceContext,
    pub name: String,
    pub opened_at: Instant,
}

/// Registry of open spans, keyed by span id.
#[derive(Debug, Default)]
pub struct SpanRegistry {
    open: DashMap<SpanId, OpenSpan>,
}

impl SpanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, context: TraceContext, name: impl Into<String>) {
        let span = OpenSpan {
            name: name.into(),
            opened_at: Instant::now(),
            context,
        };
        self.open.insert(span.context.span_id().clone(), span);
    }

    /// Remove and return the span if it is still open.
    pub fn close(&self, span_id: &SpanId) -> Option<OpenSpan> {
        self.open.remove(span_id).map(|(_, span)| span)
    }

    /// Remove and return every span open for longer than `ttl`.
    pub fn take_expired(&self, ttl: Duration) -> Vec<OpenSpan> {
        let now = Instant::now();
        let expired: Vec<SpanId> = self
            .open
            .iter()
            .filter(|entry| now.duration_since(entry.opened_at) >= ttl)
            .map(|entry| entry.key().clone())
            .collect();

        // A concurrent close may win the race for an id; that span is skipped.
        expired.iter().filter_map(|id| self.close(id)).collect()
    }

    pub fn is_open(&self, span_id: &SpanId) -> bool {
        self.open.contains_key(span_id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}
