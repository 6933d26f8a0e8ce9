//! Wire encoding of trace contexts.
//!
//! # Wire format
//! | Key | Meaning |
//! |---|---|
//! | `trace-id` | trace id |
//! | `span-id` | span id of the sender |
//! | `parent-span-id` | sender's parent span id (absent for roots) |
//! | `sampled` | `"1"` or `"0"` |
//! | `baggage-<key>` | one entry per baggage item, key lowercased, value percent-encoded |
//!
//! `decode` never fails: missing or malformed headers yield `None`, which
//! callers treat as "start a new root span".

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::context::{Baggage, SpanId, TraceContext, TraceId};
use crate::propagation::carrier::HeaderCarrier;

pub const TRACE_ID_HEADER: &str = "trace-id";
pub const SPAN_ID_HEADER: &str = "span-id";
pub const PARENT_SPAN_ID_HEADER: &str = "parent-span-id";
pub const SAMPLED_HEADER: &str = "sampled";
pub const BAGGAGE_PREFIX: &str = "baggage-";

/// Encoded header set.
pub type Headers = BTreeMap<String, String>;

/// Baggage keys must be header-safe tokens.
pub fn is_valid_baggage_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn decode_component(value: &str) -> String {
    // A serialized component contains no '&' or '=', so it parses as one key.
    form_urlencoded::parse(value.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

/// Encode `context` into a fresh header set.
pub fn encode(context: &TraceContext) -> Headers {
    let mut headers = Headers::new();
    inject(context, &mut headers);
    headers
}

/// Write `context` into an existing carrier.
pub fn inject<C: HeaderCarrier + ?Sized>(context: &TraceContext, carrier: &mut C) {
    carrier.set(TRACE_ID_HEADER, context.trace_id().to_string());
    carrier.set(SPAN_ID_HEADER, context.span_id().to_string());
    if let Some(parent) = context.parent_span_id() {
        carrier.set(PARENT_SPAN_ID_HEADER, parent.to_string());
    }
    carrier.set(
        SAMPLED_HEADER,
        if context.is_sampled() { "1" } else { "0" }.to_string(),
    );
    for (key, value) in context.baggage() {
        if is_valid_baggage_key(key) {
            carrier.set(&format!("{BAGGAGE_PREFIX}{key}"), encode_component(value));
        } else {
            tracing::debug!(key = %key, "Baggage key is not header-safe, not propagated");
        }
    }
}

fn parse_sampled(value: Option<&str>) -> Option<bool> {
    match value.map(str::trim) {
        None => Some(true),
        Some("1") | Some("true") => Some(true),
        Some("0") | Some("false") => Some(false),
        Some(_) => None,
    }
}

/// Reconstruct the sender's context, or `None` if the headers do not carry one.
pub fn decode<C: HeaderCarrier + ?Sized>(carrier: &C) -> Option<TraceContext> {
    let trace_id = TraceId::parse(carrier.get(TRACE_ID_HEADER)?)?;
    let span_id = SpanId::parse(carrier.get(SPAN_ID_HEADER)?)?;
    let parent_span_id = match carrier.get(PARENT_SPAN_ID_HEADER) {
        Some(raw) => Some(SpanId::parse(raw)?),
        None => None,
    };
    let sampled = parse_sampled(carrier.get(SAMPLED_HEADER))?;

    let mut baggage = Baggage::new();
    for header in carrier.keys() {
        let Some(prefix) = header.get(..BAGGAGE_PREFIX.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(BAGGAGE_PREFIX) {
            continue;
        }
        let key = &header[BAGGAGE_PREFIX.len()..];
        if !is_valid_baggage_key(key) {
            continue;
        }
        if let Some(raw) = carrier.get(&header) {
            baggage.insert(key.to_ascii_lowercase(), decode_component(raw));
        }
    }

    Some(TraceContext::from_parts(
        trace_id,
        span_id,
        parent_span_id,
        sampled,
        baggage,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_uses_wire_keys() {
        let ctx = TraceContext::new_root(false).with_baggage("tenant", "acme corp");
        let headers = encode(&ctx);
        assert_eq!(headers[TRACE_ID_HEADER], ctx.trace_id().as_str());
        assert_eq!(headers[SPAN_ID_HEADER], ctx.span_id().as_str());
        assert_eq!(headers[SAMPLED_HEADER], "0");
        assert_eq!(headers["baggage-tenant"], "acme+corp");
        assert!(!headers.contains_key(PARENT_SPAN_ID_HEADER));
    }

    #[test]
    fn test_child_round_trip() {
        let ctx = TraceContext::new_root(true)
            .with_baggage("userId", "u-42")
            .child()
            .with_baggage("note", "a=b&c d/é");
        assert_eq!(decode(&encode(&ctx)), Some(ctx));
    }

    #[test]
    fn test_missing_or_malformed_is_absent() {
        let empty = Headers::new();
        assert_eq!(decode(&empty), None);

        let mut only_trace = Headers::new();
        only_trace.insert(TRACE_ID_HEADER.into(), "t1".into());
        assert_eq!(decode(&only_trace), None);

        let mut bad_sampled = encode(&TraceContext::new_root(true));
        bad_sampled.insert(SAMPLED_HEADER.into(), "maybe".into());
        assert_eq!(decode(&bad_sampled), None);

        let mut bad_id = encode(&TraceContext::new_root(true));
        bad_id.insert(SPAN_ID_HEADER.into(), "white space".into());
        assert_eq!(decode(&bad_id), None);
    }

    #[test]
    fn test_missing_sampled_defaults_to_recorded() {
        let mut headers = Headers::new();
        headers.insert(TRACE_ID_HEADER.into(), "T1".into());
        headers.insert(SPAN_ID_HEADER.into(), "S1".into());
        let ctx = decode(&headers).unwrap();
        assert!(ctx.is_sampled());
        assert!(ctx.is_root());
    }

    #[test]
    fn test_http_headers_round_trip() {
        let ctx = TraceContext::new_root(true).with_baggage("region", "eu-west").child();
        let mut headers = axum::http::HeaderMap::new();
        inject(&ctx, &mut headers);
        assert_eq!(decode(&headers), Some(ctx));
    }

    #[test]
    fn test_mixed_case_baggage_survives_http() {
        let ctx = TraceContext::new_root(true)
            .with_baggage("userId", "u-42")
            .with_baggage("Tenant.Region", "eu");
        let mut headers = axum::http::HeaderMap::new();
        inject(&ctx, &mut headers);
        let decoded = decode(&headers).unwrap();
        assert_eq!(decoded, ctx);
        assert_eq!(decoded.baggage_item("userId"), Some("u-42"));
        assert_eq!(decoded.baggage_item("tenant.region"), Some("eu"));

        let mut map = Headers::new();
        map.insert(TRACE_ID_HEADER.into(), "t1".into());
        map.insert(SPAN_ID_HEADER.into(), "s1".into());
        map.insert("Baggage-UserId".into(), "u-7".into());
        assert_eq!(decode(&map).unwrap().baggage_item("userid"), Some("u-7"));
    }

    fn id_strategy() -> impl Strategy<Value = String> {
        "[!-~]{1,64}"
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            trace in id_strategy(),
            span in id_strategy(),
            parent in proptest::option::of(id_strategy()),
            sampled in any::<bool>(),
            baggage in proptest::collection::btree_map("[A-Za-z0-9_.-]{1,16}", ".{0,24}", 0..6),
        ) {
            let ctx = TraceContext::from_parts(
                TraceId::parse(&trace).unwrap(),
                SpanId::parse(&span).unwrap(),
                parent.as_deref().map(|p| SpanId::parse(p).unwrap()),
                sampled,
                baggage,
            );
            prop_assert_eq!(decode(&encode(&ctx)), Some(ctx));
        }
    }
}
