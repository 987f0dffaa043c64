use crate::common::{Tag, TraceId};
use crate::sampler::{
    SamplingStatus, SAMPLER_PARAM_TAG_KEY, SAMPLER_TYPE_PROBABILISTIC, SAMPLER_TYPE_TAG_KEY,
};

/// Samples each trace with a fixed probability, derived deterministically
/// from the low half of the trace id.
///
/// The decision is `trace_id.low < ⌊rate · 2⁶⁴⌋` with the boundary
/// precomputed at construction, so the hot path is a single comparison.
/// Rates outside `[0, 1]` are clamped to the nearest endpoint.
#[derive(Clone, Debug)]
pub struct ProbabilisticSampler {
    rate: f64,
    boundary: u64,
}

impl ProbabilisticSampler {
    /// Create a sampler with the given sampling probability.
    pub fn new(rate: f64) -> Self {
        let clamped = if rate.is_nan() {
            0.0
        } else {
            rate.clamp(0.0, 1.0)
        };
        if clamped != rate {
            tracing::warn!(
                requested = rate,
                clamped,
                "sampling rate outside [0, 1]; clamping"
            );
        }
        ProbabilisticSampler {
            rate: clamped,
            boundary: sampling_boundary(clamped),
        }
    }

    /// The effective (clamped) sampling rate.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub(crate) fn is_sampled(&self, trace_id: TraceId, _operation_name: &str) -> SamplingStatus {
        // rate = 1.0 would need a boundary of 2^64, one past u64::MAX.
        let sampled = self.rate >= 1.0 || trace_id.low() < self.boundary;
        SamplingStatus::new(sampled, self.decision_tags())
    }

    pub(crate) fn decision_tags(&self) -> Vec<Tag> {
        vec![
            Tag::new(SAMPLER_TYPE_TAG_KEY, SAMPLER_TYPE_PROBABILISTIC),
            Tag::new(SAMPLER_PARAM_TAG_KEY, self.rate),
        ]
    }
}

/// Threshold on the low trace-id half below which a trace is sampled.
fn sampling_boundary(rate: f64) -> u64 {
    const ID_SPACE: f64 = 18_446_744_073_709_551_616.0; // 2^64
    (rate * ID_SPACE) as u64
}
