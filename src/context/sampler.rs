//! Root sampling decisions.
//!
//! The decision is taken once per trace, at the root; children copy it.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// How root spans decide whether their trace is recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplingPolicy {
    Always,
    Never,
    /// Record with the given probability in `(0, 1)`.
    Ratio(f64),
}

impl SamplingPolicy {
    /// Map a configured rate onto a policy; out-of-range rates are clamped.
    pub fn from_rate(rate: f64) -> Self {
        if rate.is_nan() || rate <= 0.0 {
            SamplingPolicy::Never
        } else if rate >= 1.0 {
            SamplingPolicy::Always
        } else {
            SamplingPolicy::Ratio(rate)
        }
    }

    pub fn should_sample(&self) -> bool {
        match self {
            SamplingPolicy::Always => true,
            SamplingPolicy::Never => false,
            SamplingPolicy::Ratio(rate) => fastrand::f64() < *rate,
        }
    }
}

/// Shared, hot-swappable sampling policy.
#[derive(Debug, Clone)]
pub struct Sampler {
    policy: Arc<ArcSwap<SamplingPolicy>>,
}

impl Sampler {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self {
            policy: Arc::new(ArcSwap::from_pointee(policy)),
        }
    }

    pub fn from_rate(rate: f64) -> Self {
        Self::new(SamplingPolicy::from_rate(rate))
    }

    /// Decide for a new root span.
    pub fn decide(&self) -> bool {
        self.policy.load().should_sample()
    }

    /// Replace the policy; only traces started afterwards are affected.
    pub fn set_rate(&self, rate: f64) {
        let policy = SamplingPolicy::from_rate(rate);
        tracing::info!(?policy, "Sampling policy updated");
        self.policy.store(Arc::new(policy));
    }

    pub fn policy(&self) -> SamplingPolicy {
        **self.policy.load()
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(SamplingPolicy::Always)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_mapping() {
        assert_eq!(SamplingPolicy::from_rate(1.0), SamplingPolicy::Always);
        assert_eq!(SamplingPolicy::from_rate(7.0), SamplingPolicy::Always);
        assert_eq!(SamplingPolicy::from_rate(0.0), SamplingPolicy::Never);
        assert_eq!(SamplingPolicy::from_rate(f64::NAN), SamplingPolicy::Never);
        assert_eq!(SamplingPolicy::from_rate(0.3), SamplingPolicy::Ratio(0.3));
    }

    #[test]
    fn test_ratio_is_roughly_honoured() {
        let policy = SamplingPolicy::Ratio(0.5);
        let sampled = (0..10_000).filter(|_| policy.should_sample()).count();
        assert!((4000..6000).contains(&sampled), "sampled {}", sampled);
    }

    #[test]
    fn test_hot_swap_is_shared_between_clones() {
        let sampler = Sampler::default();
        let clone = sampler.clone();
        assert!(clone.decide());
        sampler.set_rate(0.0);
        assert!(!clone.decide());
        assert_eq!(clone.policy(), SamplingPolicy::Never);
    }
}
