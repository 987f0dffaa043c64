use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::TraceId;
use crate::sampler::strategy::PerOperationStrategies;
use crate::sampler::{
    GuaranteedThroughputProbabilisticSampler, ProbabilisticSampler, SamplingStatus,
};

/// Per-operation sampling with service-wide defaults.
///
/// Each operation gets its own
/// [`GuaranteedThroughputProbabilisticSampler`]; the first decision for an
/// unknown operation creates one from the current defaults. The map never
/// grows past `max_operations`; once full, unknown operations are served
/// by a plain probabilistic sampler at the default rate and no entry is
/// created.
#[derive(Debug)]
pub struct AdaptiveSampler {
    inner: RwLock<Inner>,
    max_operations: usize,
}

#[derive(Debug)]
struct Inner {
    default_sampling_probability: f64,
    lower_bound: f64,
    samplers: HashMap<String, GuaranteedThroughputProbabilisticSampler>,
    default_sampler: ProbabilisticSampler,
}

impl AdaptiveSampler {
    /// Build a sampler from per-operation strategies, keeping at most
    /// `max_operations` per-operation entries.
    pub fn new(strategies: &PerOperationStrategies, max_operations: usize) -> Self {
        let lower_bound = strategies.default_lower_bound_traces_per_second;
        let mut samplers = HashMap::new();
        for strategy in strategies
            .per_operation_strategies
            .iter()
            .take(max_operations)
        {
            samplers.insert(
                strategy.operation.clone(),
                GuaranteedThroughputProbabilisticSampler::new(
                    lower_bound,
                    strategy.probabilistic_sampling.sampling_rate,
                ),
            );
        }
        if strategies.per_operation_strategies.len() > max_operations {
            tracing::warn!(
                strategies = strategies.per_operation_strategies.len(),
                max_operations,
                "more per-operation strategies than the sampler can hold; ignoring the rest"
            );
        }
        AdaptiveSampler {
            inner: RwLock::new(Inner {
                default_sampling_probability: strategies.default_sampling_probability,
                lower_bound,
                samplers,
                default_sampler: ProbabilisticSampler::new(
                    strategies.default_sampling_probability,
                ),
            }),
            max_operations,
        }
    }

    /// The per-operation entry cap.
    pub fn max_operations(&self) -> usize {
        self.max_operations
    }

    /// Number of per-operation entries currently held.
    pub fn operation_count(&self) -> usize {
        self.read_inner().samplers.len()
    }

    pub(crate) fn is_sampled(&self, trace_id: TraceId, operation_name: &str) -> SamplingStatus {
        {
            let inner = self.read_inner();
            if let Some(sampler) = inner.samplers.get(operation_name) {
                return sampler.is_sampled(trace_id, operation_name);
            }
        }

        let mut inner = self.write_inner();
        // Re-check: another caller may have inserted while we upgraded.
        if inner.samplers.contains_key(operation_name) || inner.samplers.len() < self.max_operations
        {
            let lower_bound = inner.lower_bound;
            let rate = inner.default_sampling_probability;
            let sampler = inner
                .samplers
                .entry(operation_name.to_owned())
                .or_insert_with(|| {
                    GuaranteedThroughputProbabilisticSampler::new(lower_bound, rate)
                });
            return sampler.is_sampled(trace_id, operation_name);
        }
        inner.default_sampler.is_sampled(trace_id, operation_name)
    }

    /// Apply a strategy refresh: replace the defaults, update listed
    /// operations in place, insert new ones up to the cap. Operations
    /// absent from the refresh are retained as-is.
    pub(crate) fn update(&self, strategies: &PerOperationStrategies) {
        let mut inner = self.write_inner();
        inner.default_sampling_probability = strategies.default_sampling_probability;
        inner.lower_bound = strategies.default_lower_bound_traces_per_second;
        inner.default_sampler = ProbabilisticSampler::new(inner.default_sampling_probability);

        let lower_bound = inner.lower_bound;
        for strategy in &strategies.per_operation_strategies {
            let rate = strategy.probabilistic_sampling.sampling_rate;
            match inner.samplers.get_mut(&strategy.operation) {
                Some(sampler) => sampler.update(lower_bound, rate),
                None => {
                    if inner.samplers.len() < self.max_operations {
                        inner.samplers.insert(
                            strategy.operation.clone(),
                            GuaranteedThroughputProbabilisticSampler::new(lower_bound, rate),
                        );
                    }
                }
            }
        }
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Tag, TagValue};
    use crate::sampler::strategy::{OperationStrategy, ProbabilisticStrategy};
    use crate::sampler::{
        SAMPLER_PARAM_TAG_KEY, SAMPLER_TYPE_LOWERBOUND, SAMPLER_TYPE_PROBABILISTIC,
        SAMPLER_TYPE_TAG_KEY,
    };

    const MID_ID: u64 = 1 << 63;

    fn strategies(
        default_probability: f64,
        lower_bound: f64,
        ops: &[(&str, f64)],
    ) -> PerOperationStrategies {
        PerOperationStrategies {
            default_sampling_probability: default_probability,
            default_lower_bound_traces_per_second: lower_bound,
            per_operation_strategies: ops
                .iter()
                .map(|(operation, rate)| OperationStrategy {
                    operation: (*operation).to_owned(),
                    probabilistic_sampling: ProbabilisticStrategy {
                        sampling_rate: *rate,
                    },
                })
                .collect(),
        }
    }

    fn sampler_type(status: &SamplingStatus) -> &TagValue {
        status
            .tags()
            .iter()
            .find(|tag| tag.key() == SAMPLER_TYPE_TAG_KEY)
            .map(Tag::value)
            .expect("sampler.type tag missing")
    }

    fn sampler_param(status: &SamplingStatus) -> &TagValue {
        status
            .tags()
            .iter()
            .find(|tag| tag.key() == SAMPLER_PARAM_TAG_KEY)
            .map(Tag::value)
            .expect("sampler.param tag missing")
    }

    #[test]
    fn known_operation_uses_its_own_sampler() {
        let sampler = AdaptiveSampler::new(&strategies(0.5, 1.0, &[("op", 0.5)]), 10);

        // Probabilistic miss, admitted by the lower bound.
        let status = sampler.is_sampled(TraceId::new(0, MID_ID + 10), "op");
        assert!(status.is_sampled());
        assert_eq!(
            sampler_type(&status),
            &TagValue::String(SAMPLER_TYPE_LOWERBOUND.to_owned())
        );

        // Probabilistic hit.
        let status = sampler.is_sampled(TraceId::new(0, MID_ID - 20), "op");
        assert!(status.is_sampled());
        assert_eq!(
            sampler_type(&status),
            &TagValue::String(SAMPLER_TYPE_PROBABILISTIC.to_owned())
        );

        // The hit above consumed the lower-bound token, so the next miss
        // is rejected.
        let status = sampler.is_sampled(TraceId::new(0, MID_ID + 10), "op");
        assert!(!status.is_sampled());
    }

    #[test]
    fn first_decision_for_an_unknown_operation_creates_an_entry() {
        let sampler = AdaptiveSampler::new(&strategies(0.5, 1.0, &[("op", 0.5)]), 10);
        assert_eq!(sampler.operation_count(), 1);

        let status = sampler.is_sampled(TraceId::new(0, MID_ID - 20), "firstTimeOp");
        assert!(status.is_sampled());
        assert_eq!(
            sampler_type(&status),
            &TagValue::String(SAMPLER_TYPE_PROBABILISTIC.to_owned())
        );
        assert_eq!(sampler.operation_count(), 2);
    }

    #[test]
    fn never_holds_more_than_max_operations() {
        let sampler = AdaptiveSampler::new(&strategies(1.0, 0.0, &[("op", 1.0)]), 1);
        assert_eq!(sampler.operation_count(), 1);

        // Beyond the cap: served by the default probabilistic sampler,
        // no entry created.
        let status = sampler.is_sampled(TraceId::new(0, 1), "overflow");
        assert!(status.is_sampled());
        assert_eq!(
            sampler_type(&status),
            &TagValue::String(SAMPLER_TYPE_PROBABILISTIC.to_owned())
        );
        assert_eq!(sampler.operation_count(), 1);
    }

    #[test]
    fn construction_ignores_strategies_beyond_the_cap() {
        let sampler =
            AdaptiveSampler::new(&strategies(0.5, 1.0, &[("a", 0.1), ("b", 0.2), ("c", 0.3)]), 2);
        assert_eq!(sampler.operation_count(), 2);
    }

    #[test]
    fn update_refreshes_listed_operations_and_keeps_the_rest() {
        let sampler = AdaptiveSampler::new(&strategies(0.5, 2.0, &[("op", 0.1)]), 10);

        sampler.update(&strategies(0.1, 3.0, &[("op", 0.2), ("newOp", 0.2)]));
        assert_eq!(sampler.operation_count(), 2);

        // The lower bound changed, so "op" has a fresh bucket; a
        // probabilistic miss is admitted by it and reports the new rate.
        let status = sampler.is_sampled(TraceId::new(0, u64::MAX), "op");
        assert!(status.is_sampled());
        assert_eq!(
            sampler_type(&status),
            &TagValue::String(SAMPLER_TYPE_LOWERBOUND.to_owned())
        );
        assert_eq!(sampler_param(&status), &TagValue::F64(0.2));
    }

    #[test]
    fn update_does_not_grow_past_the_cap() {
        let sampler = AdaptiveSampler::new(&strategies(0.5, 1.0, &[("op", 0.1)]), 1);
        sampler.update(&strategies(0.5, 1.0, &[("op", 0.2), ("other", 0.3)]));
        assert_eq!(sampler.operation_count(), 1);
    }
}
