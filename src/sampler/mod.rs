//! The sampling engine: decides which spans exist at all.
//!
//! A [`Sampler`] maps `(trace_id, operation_name)` to a
//! [`SamplingStatus`]: keep or drop, plus tags describing why. Decisions
//! are safe under concurrent invocation, never block on I/O, and run in
//! constant time (amortized constant for the rate-limited and adaptive
//! variants).
//!
//! The variants form a closed set, so dispatch is a tagged enum rather
//! than trait objects. The leaves ([`ConstSampler`],
//! [`ProbabilisticSampler`], [`RateLimitingSampler`]) compose into
//! [`GuaranteedThroughputProbabilisticSampler`] and [`AdaptiveSampler`],
//! and [`RemotelyControlledSampler`] swaps between all of them as the
//! control plane dictates.

mod adaptive;
mod guaranteed;
mod probabilistic;
mod rate_limiting;
mod remote;
mod strategy;

pub use adaptive::AdaptiveSampler;
pub use guaranteed::GuaranteedThroughputProbabilisticSampler;
pub use probabilistic::ProbabilisticSampler;
pub use rate_limiting::RateLimitingSampler;
pub use remote::{RemotelyControlledSampler, RemotelyControlledSamplerBuilder};
pub use strategy::{
    OperationStrategy, PerOperationStrategies, ProbabilisticStrategy, RateLimitingStrategy,
    StrategyFetcher, StrategyResponse,
};

use crate::common::{Tag, TraceId};

/// Tag key naming the sampler variant that made a decision.
pub const SAMPLER_TYPE_TAG_KEY: &str = "sampler.type";
/// Tag key carrying the deciding sampler's parameter.
pub const SAMPLER_PARAM_TAG_KEY: &str = "sampler.param";

/// `sampler.type` value for [`ConstSampler`] decisions.
pub const SAMPLER_TYPE_CONST: &str = "const";
/// `sampler.type` value for [`ProbabilisticSampler`] decisions.
pub const SAMPLER_TYPE_PROBABILISTIC: &str = "probabilistic";
/// `sampler.type` value for [`RateLimitingSampler`] decisions.
pub const SAMPLER_TYPE_RATELIMITING: &str = "ratelimiting";
/// `sampler.type` value for lower-bound admissions.
pub const SAMPLER_TYPE_LOWERBOUND: &str = "lowerbound";

/// The outcome of one sampling decision.
///
/// The tags are added verbatim to the span when the decision keeps it;
/// they may be present (informationally) even when it does not.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingStatus {
    sampled: bool,
    tags: Vec<Tag>,
}

impl SamplingStatus {
    pub(crate) fn new(sampled: bool, tags: Vec<Tag>) -> Self {
        SamplingStatus { sampled, tags }
    }

    /// Whether the span should be recorded and reported.
    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Tags describing the decision.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Consume the status, yielding the decision tags.
    pub fn into_tags(self) -> Vec<Tag> {
        self.tags
    }
}

/// Samples everything or nothing.
#[derive(Clone, Debug)]
pub struct ConstSampler {
    decision: bool,
}

impl ConstSampler {
    /// Create a sampler that always answers `decision`.
    pub fn new(decision: bool) -> Self {
        ConstSampler { decision }
    }

    /// The fixed decision.
    pub fn decision(&self) -> bool {
        self.decision
    }

    pub(crate) fn is_sampled(&self, _trace_id: TraceId, _operation_name: &str) -> SamplingStatus {
        SamplingStatus::new(
            self.decision,
            vec![
                Tag::new(SAMPLER_TYPE_TAG_KEY, SAMPLER_TYPE_CONST),
                Tag::new(SAMPLER_PARAM_TAG_KEY, self.decision),
            ],
        )
    }
}

/// A sampling strategy.
///
/// Construct the variant you need directly, or use
/// [`RemotelyControlledSampler::builder`] for the control-plane-driven
/// one.
#[derive(Debug)]
#[non_exhaustive]
pub enum Sampler {
    /// Always or never sample.
    Const(ConstSampler),
    /// Sample a fixed fraction of traces by trace id.
    Probabilistic(ProbabilisticSampler),
    /// Sample up to a fixed number of traces per second.
    RateLimiting(RateLimitingSampler),
    /// Probabilistic sampling with a guaranteed per-second floor.
    GuaranteedThroughput(GuaranteedThroughputProbabilisticSampler),
    /// Per-operation sampling with service-wide defaults.
    Adaptive(AdaptiveSampler),
    /// A delegate sampler refreshed from the control plane.
    RemotelyControlled(RemotelyControlledSampler),
}

impl Sampler {
    /// Decide whether a span for `operation_name` in the given trace
    /// should be recorded.
    pub fn is_sampled(&self, trace_id: TraceId, operation_name: &str) -> SamplingStatus {
        match self {
            Sampler::Const(sampler) => sampler.is_sampled(trace_id, operation_name),
            Sampler::Probabilistic(sampler) => sampler.is_sampled(trace_id, operation_name),
            Sampler::RateLimiting(sampler) => sampler.is_sampled(trace_id, operation_name),
            Sampler::GuaranteedThroughput(sampler) => {
                sampler.is_sampled(trace_id, operation_name)
            }
            Sampler::Adaptive(sampler) => sampler.is_sampled(trace_id, operation_name),
            Sampler::RemotelyControlled(sampler) => {
                sampler.is_sampled(trace_id, operation_name)
            }
        }
    }

    /// Release background resources. A no-op for the leaf variants; the
    /// remotely-controlled sampler stops its refresher and afterwards
    /// answers not-sampled.
    pub fn close(&self) {
        if let Sampler::RemotelyControlled(sampler) = self {
            sampler.close();
        }
    }
}
