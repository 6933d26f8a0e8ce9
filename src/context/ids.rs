//! Trace and span identifiers.
//!
//! Locally generated ids have a fixed shape (32 hex chars for traces, 16 for
//! spans). Ids received from other services are opaque: anything of 1..=128
//! visible ASCII characters is accepted.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest id accepted from the wire.
pub const MAX_ID_LEN: usize = 128;

fn is_valid_token(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_ID_LEN && s.bytes().all(|b| b.is_ascii_graphic())
}

/// Identity shared by every span of one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraceId(String);

impl TraceId {
    /// Generate a fresh, globally unique trace id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept an id received from another process.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        is_valid_token(s).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of one hop within a trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpanId(String);

impl SpanId {
    /// Generate a fresh span id (random, never all zeros).
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let raw = loop {
            let candidate: u64 = rng.gen();
            if candidate != 0 {
                break candidate;
            }
        };
        Self(format!("{:016x}", raw))
    }

    /// Accept an id received from another process.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        is_valid_token(s).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! string_id_conversions {
    ($name:ident, $what:literal) => {
        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value).ok_or_else(|| format!("invalid {}: {:?}", $what, value))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }
    };
}

string_id_conversions!(TraceId, "trace id");
string_id_conversions!(SpanId, "span id");

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_shapes() {
        let trace = TraceId::generate();
        assert_eq!(trace.as_str().len(), 32);
        assert!(trace.as_str().bytes().all(|b| b.is_ascii_hexdigit()));

        let span = SpanId::generate();
        assert_eq!(span.as_str().len(), 16);
        assert_ne!(span.as_str(), "0000000000000000");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: HashSet<_> = (0..1000).map(|_| SpanId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(TraceId::parse("").is_none());
        assert!(TraceId::parse("   ").is_none());
        assert!(TraceId::parse("has space").is_none());
        assert!(TraceId::parse(&"a".repeat(129)).is_none());
        assert!(SpanId::parse("caf\u{e9}").is_none());
        assert_eq!(TraceId::parse(" T1 ").unwrap().as_str(), "T1");
    }

    #[test]
    fn test_serde_validates() {
        let id: TraceId = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert!(serde_json::from_str::<SpanId>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    }
}
