//! Error types for the client core.
//!
//! The tracing client must never fail its host application: hot-path
//! operations are infallible and every failure inside the core either
//! degrades (drop + count) or retries. The types here surface on the
//! control surfaces only (`flush`/`close`) or cross the collaborator seams
//! ([`Transport`](crate::transport::Transport),
//! [`StrategyFetcher`](crate::sampler::StrategyFetcher)).

use std::time::Duration;

use thiserror::Error;

/// A specialized `Result` for pipeline control operations.
pub type PipelineResult = Result<(), PipelineError>;

/// Errors reported by reporter control operations.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PipelineError {
    /// The pipeline was already closed.
    #[error("reporter already closed")]
    AlreadyClosed,

    /// The operation did not complete before the deadline passed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The operation failed with an internal error.
    #[error("{0}")]
    InternalFailure(String),
}

/// Errors raised by [`Transport`](crate::transport::Transport)
/// implementations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// A batch could not be shipped over the wire. The spans it contained
    /// are lost.
    #[error("failed to ship {spans} span(s): {message}")]
    SendFailed {
        /// Description of the wire-level failure.
        message: String,
        /// Number of spans in the failed batch.
        spans: usize,
    },

    /// The transport was used after `close`.
    #[error("transport already closed")]
    Closed,
}

/// Errors raised by [`StrategyFetcher`](crate::sampler::StrategyFetcher)
/// implementations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FetchError {
    /// The request to the control plane failed.
    #[error("strategy request failed: {0}")]
    Request(String),

    /// The control plane answered with a malformed document.
    #[error("malformed strategy response: {0}")]
    Decode(#[from] serde_json::Error),
}
