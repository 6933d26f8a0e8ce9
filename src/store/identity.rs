//! Content identity of stored events.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::events::LogEvent;

/// SHA-256 over `(traceId, spanId, timestamp, service)`, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventId(String);

impl EventId {
    pub fn of(event: &LogEvent) -> Self {
        let micros = event.timestamp_micros().to_string();
        let mut hasher = Sha256::new();
        for part in [
            event.trace_id.as_str(),
            event.span_id.as_str(),
            micros.as_str(),
            event.service.as_str(),
        ] {
            hasher.update(part.as_bytes());
            // Unit separator keeps ("ab","c") and ("a","bc") apart.
            hasher.update([0x1f]);
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
