//! Creation and continuation of trace contexts.

use crate::context::sampler::Sampler;
use crate::context::scope::{self, ContextError};
use crate::context::trace_context::TraceContext;
use crate::propagation::{codec, HeaderCarrier};

/// Creates root and child contexts under one sampling policy.
#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    sampler: Sampler,
}

impl ContextManager {
    pub fn new(sampler: Sampler) -> Self {
        Self { sampler }
    }

    /// Fresh trace; the sampling decision is taken here, once.
    pub fn begin_root_span(&self) -> TraceContext {
        TraceContext::new_root(self.sampler.decide())
    }

    /// Next hop of `parent`'s trace; sampling is copied, never re-decided.
    pub fn begin_child_span(&self, parent: &TraceContext) -> TraceContext {
        parent.child()
    }

    /// Child of whatever is active, or a new root when nothing is.
    pub fn begin_span(&self) -> TraceContext {
        match scope::current_context() {
            Ok(parent) => self.begin_child_span(&parent),
            Err(ContextError::NoActiveContext) => self.begin_root_span(),
        }
    }

    /// Continue the trace described by inbound headers, or start a new one
    /// when they are missing or malformed.
    pub fn continue_or_begin<C: HeaderCarrier + ?Sized>(&self, carrier: &C) -> TraceContext {
        match codec::decode(carrier) {
            Some(remote) => self.begin_child_span(&remote),
            None => {
                tracing::debug!("No usable propagation headers, starting root span");
                self.begin_root_span()
            }
        }
    }

    pub fn current_context(&self) -> Result<TraceContext, ContextError> {
        scope::current_context()
    }

    pub fn with_context<R>(&self, context: TraceContext, body: impl FnOnce() -> R) -> R {
        scope::with_context(context, body)
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Hot-swap the sampling rate for traces started from now on.
    pub fn set_sampling_rate(&self, rate: f64) {
        self.sampler.set_rate(rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::sampler::SamplingPolicy;
    use std::collections::HashMap;

    #[test]
    fn test_root_sampling_follows_policy() {
        let never = ContextManager::new(Sampler::new(SamplingPolicy::Never));
        assert!(!never.begin_root_span().is_sampled());
        let always = ContextManager::default();
        assert!(always.begin_root_span().is_sampled());
    }

    #[test]
    fn test_child_keeps_decision_after_rate_change() {
        let manager = ContextManager::default();
        let root = manager.begin_root_span();
        manager.set_sampling_rate(0.0);
        let child = manager.begin_child_span(&root);
        assert!(child.is_sampled());
        assert!(!manager.begin_root_span().is_sampled());
    }

    #[test]
    fn test_begin_span_uses_active_parent() {
        let manager = ContextManager::default();
        let root = manager.begin_root_span();
        let child = manager.with_context(root.clone(), || manager.begin_span());
        assert_eq!(child.parent_span_id(), Some(root.span_id()));

        let detached = manager.begin_span();
        assert!(detached.is_root());
    }

    #[test]
    fn test_missing_headers_start_a_root() {
        let manager = ContextManager::default();
        let headers: HashMap<String, String> = HashMap::new();
        let ctx = manager.continue_or_begin(&headers);
        assert!(ctx.is_root());
    }

    #[test]
    fn test_headers_continue_remote_trace() {
        let manager = ContextManager::default();
        let upstream = manager.begin_root_span();
        let mut headers: HashMap<String, String> = HashMap::new();
        codec::inject(&upstream, &mut headers);

        let ctx = manager.continue_or_begin(&headers);
        assert_eq!(ctx.trace_id(), upstream.trace_id());
        assert_eq!(ctx.parent_span_id(), Some(upstream.span_id()));
    }
}
