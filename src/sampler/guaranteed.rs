use crate::common::{Tag, TraceId};
use crate::sampler::{
    ProbabilisticSampler, RateLimitingSampler, SamplingStatus, SAMPLER_PARAM_TAG_KEY,
    SAMPLER_TYPE_LOWERBOUND, SAMPLER_TYPE_TAG_KEY,
};

/// Probabilistic sampling with a guaranteed per-second floor.
///
/// A probabilistic sampler makes the primary decision; a lower-bound
/// token bucket admits traces the probabilistic sampler rejected, so that
/// sustained traffic is sampled at an effective rate of
/// `max(rate, lower_bound / traffic)`.
///
/// Both sub-deciders run on every call: a probabilistic hit still
/// withdraws a lower-bound credit, which is what keeps the floor a floor
/// instead of an addition on top of the probabilistic rate.
#[derive(Debug)]
pub struct GuaranteedThroughputProbabilisticSampler {
    probabilistic: ProbabilisticSampler,
    lower_bound_sampler: RateLimitingSampler,
    lower_bound: f64,
}

impl GuaranteedThroughputProbabilisticSampler {
    /// Create a sampler with the given floor (traces per second) and
    /// probabilistic rate.
    pub fn new(lower_bound: f64, rate: f64) -> Self {
        GuaranteedThroughputProbabilisticSampler {
            probabilistic: ProbabilisticSampler::new(rate),
            lower_bound_sampler: RateLimitingSampler::new(lower_bound),
            lower_bound,
        }
    }

    /// The guaranteed minimum traces per second.
    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// The probabilistic sampling rate.
    pub fn rate(&self) -> f64 {
        self.probabilistic.rate()
    }

    /// Replace both parameters. The lower-bound bucket keeps its accrued
    /// credit when the bound is unchanged; the rate is clamped into
    /// `[0, 1]`.
    pub fn update(&mut self, lower_bound: f64, rate: f64) {
        if self.lower_bound != lower_bound {
            self.lower_bound_sampler = RateLimitingSampler::new(lower_bound);
            self.lower_bound = lower_bound;
        }
        if self.probabilistic.rate() != rate {
            self.probabilistic = ProbabilisticSampler::new(rate);
        }
    }

    pub(crate) fn is_sampled(&self, trace_id: TraceId, operation_name: &str) -> SamplingStatus {
        let probabilistic = self.probabilistic.is_sampled(trace_id, operation_name);
        let lower_bound = self.lower_bound_sampler.is_sampled(trace_id, operation_name);
        if probabilistic.is_sampled() {
            return probabilistic;
        }
        if lower_bound.is_sampled() {
            return SamplingStatus::new(
                true,
                vec![
                    Tag::new(SAMPLER_TYPE_TAG_KEY, SAMPLER_TYPE_LOWERBOUND),
                    Tag::new(SAMPLER_PARAM_TAG_KEY, self.probabilistic.rate()),
                ],
            );
        }
        probabilistic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TagValue;
    use crate::sampler::SAMPLER_TYPE_PROBABILISTIC;

    const MID_ID: u64 = 1 << 63;

    fn sampler_type(status: &SamplingStatus) -> &TagValue {
        status
            .tags()
            .iter()
            .find(|tag| tag.key() == SAMPLER_TYPE_TAG_KEY)
            .map(Tag::value)
            .expect("sampler.type tag missing")
    }

    #[test]
    fn update_replaces_parameters_and_clamps_the_rate() {
        let mut sampler = GuaranteedThroughputProbabilisticSampler::new(2.0, 0.5);
        assert_eq!(sampler.lower_bound(), 2.0);
        assert_eq!(sampler.rate(), 0.5);

        sampler.update(1.0, 0.6);
        assert_eq!(sampler.lower_bound(), 1.0);
        assert_eq!(sampler.rate(), 0.6);

        sampler.update(1.0, 1.1);
        assert_eq!(sampler.lower_bound(), 1.0);
        assert_eq!(sampler.rate(), 1.0);
    }

    #[test]
    fn probabilistic_miss_falls_back_to_the_lower_bound() {
        let sampler = GuaranteedThroughputProbabilisticSampler::new(1.0, 0.5);

        let status = sampler.is_sampled(TraceId::new(0, MID_ID + 10), "op");
        assert!(status.is_sampled());
        assert_eq!(
            sampler_type(&status),
            &TagValue::String(SAMPLER_TYPE_LOWERBOUND.to_owned())
        );
        // The lower-bound param reports the probabilistic rate.
        assert_eq!(status.tags()[1].value(), &TagValue::F64(0.5));

        // Token spent; an immediate second miss is rejected with the
        // probabilistic tags.
        let status = sampler.is_sampled(TraceId::new(0, MID_ID + 10), "op");
        assert!(!status.is_sampled());
        assert_eq!(
            sampler_type(&status),
            &TagValue::String(SAMPLER_TYPE_PROBABILISTIC.to_owned())
        );
    }

    #[test]
    fn probabilistic_hit_still_spends_a_token() {
        let mut sampler = GuaranteedThroughputProbabilisticSampler::new(1.0, 1.0);

        let status = sampler.is_sampled(TraceId::new(0, MID_ID), "op");
        assert!(status.is_sampled());
        assert_eq!(
            sampler_type(&status),
            &TagValue::String(SAMPLER_TYPE_PROBABILISTIC.to_owned())
        );

        // Same lower bound keeps the (now empty) bucket across the update.
        sampler.update(1.0, 0.0);
        let status = sampler.is_sampled(TraceId::new(0, MID_ID), "op");
        assert!(!status.is_sampled(), "token was consumed by the hit above");
    }
}
