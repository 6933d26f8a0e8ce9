//! Error details attached to ERROR events.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;

use serde::{Deserialize, Serialize};

/// Type, message, stack frames and cause chain of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub type_name: String,
    pub message: String,
    /// Innermost frame first.
    #[serde(default)]
    pub frames: Vec<String>,
    /// Messages of `source()` errors, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
            frames: Vec::new(),
            causes: Vec::new(),
        }
    }

    /// Describe `err` along with the stack at the point of the call.
    ///
    /// The stack is captured regardless of `RUST_BACKTRACE`, so ERROR
    /// events carry frames in release deployments too.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            type_name: std::any::type_name::<E>().to_string(),
            message: err.to_string(),
            frames: capture_frames(),
            causes,
        }
    }

    pub fn with_frames(mut self, frames: Vec<String>) -> Self {
        self.frames = frames;
        self
    }
}

/// Deep recursion should not blow up a single event.
const MAX_FRAMES: usize = 64;

fn capture_frames() -> Vec<String> {
    let backtrace = Backtrace::force_capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return Vec::new();
    }
    parse_frames(&backtrace.to_string())
}

// Frame lines look like "  12: crate::module::function"; the "at file:line"
// lines that follow are folded away.
fn parse_frames(rendered: &str) -> Vec<String> {
    rendered
        .lines()
        .filter_map(|line| {
            let (index, symbol) = line.trim_start().split_once(": ")?;
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            Some(symbol.trim().to_string())
        })
        .take(MAX_FRAMES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("gateway rejected card")]
    struct GatewayError {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn test_from_error_chain() {
        let err = GatewayError {
            source: std::io::Error::other("connection reset"),
        };
        let info = ExceptionInfo::from_error(&err);
        assert!(info.type_name.ends_with("GatewayError"));
        assert_eq!(info.message, "gateway rejected card");
        assert_eq!(info.causes, vec!["connection reset".to_string()]);
    }

    #[test]
    fn test_frames_captured_for_every_error() {
        let err = std::io::Error::other("disk full");
        let info = ExceptionInfo::from_error(&err);
        assert!(!info.frames.is_empty());
        assert!(info.frames.len() <= MAX_FRAMES);
    }

    #[test]
    fn test_parse_frames() {
        let rendered = "   0: app::pay\n             at ./src/pay.rs:10:5\n   1: app::main\n";
        assert_eq!(parse_frames(rendered), vec!["app::pay", "app::main"]);
    }

    #[test]
    fn test_serialized_shape() {
        let info = ExceptionInfo::new("Timeout", "upstream timed out").with_frames(vec!["a".into()]);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "Timeout");
        assert_eq!(json["frames"][0], "a");
        assert!(json.get("causes").is_none());
    }
}
