//! In-memory event set with ordered secondary indexes.
//!
//! Every index is a vector of [`Position`]s sorted by `(timestamp, seq)`,
//! where `seq` is the insertion number. Events arrive roughly in time order,
//! so inserts are near-appends and range scans are binary searches.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::context::{SpanId, TraceId};
use crate::events::{Level, LogEvent};
use crate::store::identity::EventId;

/// Sort key of an event: microsecond timestamp, then insertion order.
pub type Position = (i64, u64);

#[derive(Debug, Default)]
pub struct EventIndex {
    events: Vec<LogEvent>,
    ids: HashSet<EventId>,
    by_trace: HashMap<TraceId, Vec<Position>>,
    by_service: HashMap<String, Vec<Position>>,
    by_level: HashMap<Level, Vec<Position>>,
    by_time: Vec<Position>,
}

fn insert_sorted(list: &mut Vec<Position>, position: Position) {
    let at = list.partition_point(|p| *p < position);
    list.insert(at, position);
}

impl EventIndex {
    pub fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }

    /// Index an event whose identity is not yet present.
    pub fn insert(&mut self, id: EventId, event: LogEvent) -> Position {
        let position = (event.timestamp_micros(), self.events.len() as u64);
        insert_sorted(self.by_trace.entry(event.trace_id.clone()).or_default(), position);
        insert_sorted(self.by_service.entry(event.service.clone()).or_default(), position);
        insert_sorted(self.by_level.entry(event.level).or_default(), position);
        insert_sorted(&mut self.by_time, position);
        self.ids.insert(id);
        self.events.push(event);
        position
    }

    pub fn event(&self, position: Position) -> Option<&LogEvent> {
        self.events.get(position.1 as usize)
    }

    pub fn trace(&self, trace_id: &TraceId) -> &[Position] {
        self.by_trace.get(trace_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn service(&self, service: &str) -> &[Position] {
        self.by_service.get(service).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn level(&self, level: Level) -> &[Position] {
        self.by_level.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all(&self) -> &[Position] {
        &self.by_time
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn trace_count(&self) -> usize {
        self.by_trace.len()
    }

    pub fn services(&self) -> BTreeSet<String> {
        self.by_service.keys().cloned().collect()
    }

    /// Distinct span ids seen for a trace.
    pub fn spans_of(&self, trace_id: &TraceId) -> HashSet<&SpanId> {
        self.trace(trace_id)
            .iter()
            .filter_map(|p| self.event(*p))
            .map(|e| &e.span_id)
            .collect()
    }
}
