//! The propagated trace identity of one span.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::context::ids::{SpanId, TraceId};

/// Opaque key/value pairs carried alongside the trace identity.
///
/// Keys are ASCII-lowercased on the way in: HTTP lowercases header names, so
/// a mixed-case key could not survive a hop otherwise.
pub type Baggage = BTreeMap<String, String>;

fn normalize_baggage(baggage: Baggage) -> Baggage {
    baggage
        .into_iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .collect()
}

/// Trace identity of the span currently executing.
///
/// Values are immutable: deriving a child or adding baggage produces a new
/// context. Baggage is an ordered map so equality does not depend on
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    trace_id: TraceId,
    span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_span_id: Option<SpanId>,
    sampled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    baggage: Baggage,
}

impl TraceContext {
    /// A new root: fresh trace, fresh span, no parent.
    pub fn new_root(sampled: bool) -> Self {
        Self {
            trace_id: TraceId::generate(),
            span_id: SpanId::generate(),
            parent_span_id: None,
            sampled,
            baggage: Baggage::new(),
        }
    }

    /// A child of `self`: same trace, fresh span, sampling and baggage inherited.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: SpanId::generate(),
            parent_span_id: Some(self.span_id.clone()),
            sampled: self.sampled,
            baggage: self.baggage.clone(),
        }
    }

    /// Reassemble a context from its parts (used by the codec).
    pub fn from_parts(
        trace_id: TraceId,
        span_id: SpanId,
        parent_span_id: Option<SpanId>,
        sampled: bool,
        baggage: Baggage,
    ) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id,
            sampled,
            baggage: normalize_baggage(baggage),
        }
    }

    /// Copy of this context with one more baggage item.
    pub fn with_baggage(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.baggage.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    pub fn span_id(&self) -> &SpanId {
        &self.span_id
    }

    pub fn parent_span_id(&self) -> Option<&SpanId> {
        self.parent_span_id.as_ref()
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    pub fn baggage(&self) -> &Baggage {
        &self.baggage
    }

    pub fn baggage_item(&self, key: &str) -> Option<&str> {
        self.baggage.get(&key.to_ascii_lowercase()).map(String::as_str)
    }
}
