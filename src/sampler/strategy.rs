//! Sampling-strategy records served by the control plane, and the fetcher
//! seam that retrieves them.

use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Samples traces with a fixed probability.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbabilisticStrategy {
    /// Sampling probability in the range `[0.0, 1.0]`.
    pub sampling_rate: f64,
}

/// Samples a fixed number of traces per second.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitingStrategy {
    /// Maximum number of sampled traces per second. May be fractional to
    /// express rates like one trace per minute.
    pub max_traces_per_second: f64,
}

/// A sampling strategy for a single operation (endpoint, span name).
/// Only probabilistic sampling is supported per operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OperationStrategy {
    /// The operation this strategy applies to.
    pub operation: String,
    /// The probabilistic rate for that operation.
    pub probabilistic_sampling: ProbabilisticStrategy,
}

/// Per-operation strategies plus service-wide defaults.
///
/// Useful for services whose endpoints receive vastly different traffic:
/// a single service-wide rate would either drown the collector for hot
/// endpoints or never sample cold ones. The lower bound guarantees some
/// minimal sampling for every operation regardless of its probabilistic
/// rate; the limit is local to one client instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerOperationStrategies {
    /// Sampling probability for operations without an explicit entry.
    pub default_sampling_probability: f64,
    /// Guaranteed minimum traces per second, applied to every operation.
    pub default_lower_bound_traces_per_second: f64,
    /// Strategies for individual operations.
    pub per_operation_strategies: Vec<OperationStrategy>,
}

/// The overall strategy for one service, as served by the control plane.
///
/// A union: exactly one of the fields is expected to be set. Responses
/// that set none or several are invalid and are skipped by the consumer.
/// Unknown fields in the wire form (such as the legacy `strategyType`
/// discriminator) are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategyResponse {
    /// Service-wide probabilistic sampling.
    pub probabilistic_sampling: Option<ProbabilisticStrategy>,
    /// Service-wide rate-limited sampling.
    pub rate_limiting_sampling: Option<RateLimitingStrategy>,
    /// Per-operation sampling.
    pub operation_sampling: Option<PerOperationStrategies>,
}

impl StrategyResponse {
    /// A response selecting probabilistic sampling at `rate`.
    pub fn probabilistic(rate: f64) -> Self {
        StrategyResponse {
            probabilistic_sampling: Some(ProbabilisticStrategy {
                sampling_rate: rate,
            }),
            ..Default::default()
        }
    }

    /// A response selecting rate-limited sampling.
    pub fn rate_limiting(max_traces_per_second: f64) -> Self {
        StrategyResponse {
            rate_limiting_sampling: Some(RateLimitingStrategy {
                max_traces_per_second,
            }),
            ..Default::default()
        }
    }

    /// A response selecting per-operation sampling.
    pub fn per_operation(strategies: PerOperationStrategies) -> Self {
        StrategyResponse {
            operation_sampling: Some(strategies),
            ..Default::default()
        }
    }
}

/// Retrieves the current sampling strategy for a service.
///
/// Called only from the sampler's background refresher thread, so
/// implementations may block on I/O. The usual implementation is an HTTP
/// GET against the agent's `/sampling?service=<name>` endpoint decoded
/// with `serde_json`; the core does not provide one.
pub trait StrategyFetcher: Send + 'static {
    /// Fetch the strategy for `service_name`.
    fn fetch(&self, service_name: &str) -> Result<StrategyResponse, FetchError>;
}

impl<F> StrategyFetcher for F
where
    F: Fn(&str) -> Result<StrategyResponse, FetchError> + Send + 'static,
{
    fn fetch(&self, service_name: &str) -> Result<StrategyResponse, FetchError> {
        self(service_name)
    }
}
