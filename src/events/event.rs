//! The LogEvent record and its canonical JSON form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{Fields, SpanId, TraceContext, TraceId};
use crate::events::exception::ExceptionInfo;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown level: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// One structured log record.
///
/// Field declaration order is the canonical serialization order; the store,
/// the ingest endpoint and the spool all exchange this exact shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[serde(with = "micros_rfc3339")]
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub service: String,
    #[serde(default)]
    pub logger: String,
    pub message: String,
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default)]
    pub parent_span_id: Option<SpanId>,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionInfo>,
}

impl LogEvent {
    /// Event stamped with the ids of `context`.
    pub fn new(
        timestamp: DateTime<Utc>,
        level: Level,
        service: impl Into<String>,
        logger: impl Into<String>,
        message: impl Into<String>,
        context: &TraceContext,
    ) -> Self {
        Self {
            timestamp,
            level,
            service: service.into(),
            logger: logger.into(),
            message: message.into(),
            trace_id: context.trace_id().clone(),
            span_id: context.span_id().clone(),
            parent_span_id: context.parent_span_id().cloned(),
            fields: Fields::new(),
            exception: None,
        }
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    /// Microseconds since the Unix epoch; the ordering key in the store.
    pub fn timestamp_micros(&self) -> i64 {
        self.timestamp.timestamp_micros()
    }

    /// Single-line canonical JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

/// Build a field map from literal pairs.
pub fn fields(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

mod micros_rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let parsed = DateTime::parse_from_rfc3339(&raw).map_err(serde::de::Error::custom)?;
        let utc = parsed.with_timezone(&Utc);
        // Truncate to the precision the store orders by.
        DateTime::from_timestamp_micros(utc.timestamp_micros())
            .ok_or_else(|| serde::de::Error::custom("timestamp out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> LogEvent {
        let ctx = TraceContext::new_root(true).child();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        LogEvent::new(ts, Level::Info, "booking", "booking.api", "booking created", &ctx)
            .with_fields(fields(&[("bookingId", "b-42"), ("userId", "u-7")]))
    }

    #[test]
    fn test_canonical_field_order() {
        let json = sample().to_json().unwrap();
        let keys = [
            "\"timestamp\"",
            "\"level\"",
            "\"service\"",
            "\"logger\"",
            "\"message\"",
            "\"traceId\"",
            "\"spanId\"",
            "\"parentSpanId\"",
            "\"fields\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
        assert!(!json.contains("exception"));
        assert!(json.contains("\"timestamp\":\"2024-03-01T12:00:00.000000Z\""));
        assert!(json.contains("\"level\":\"INFO\""));
    }

    #[test]
    fn test_json_parse_back() {
        let event = sample();
        let parsed = LogEvent::from_json(&event.to_json().unwrap()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_rejects_invalid_ids() {
        let line = r#"{"timestamp":"2024-03-01T12:00:00Z","level":"INFO","service":"s","message":"m","traceId":"","spanId":"a"}"#;
        assert!(LogEvent::from_json(line).is_err());
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("error".parse::<Level>().unwrap(), Level::Error);
        assert_eq!("Warning".parse::<Level>().unwrap(), Level::Warn);
        assert!("fatal".parse::<Level>().is_err());
        assert!(Level::Debug < Level::Error);
    }
}
