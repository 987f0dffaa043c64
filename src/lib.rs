//! The core of an in-process distributed tracing client.
//!
//! `tracebound` records which spans of work exist at all (the sampling
//! engine) and ships the finished ones to an out-of-process collector
//! agent (the reporter pipeline). It is built to be embedded in
//! application processes: hot-path operations impose negligible latency,
//! memory and bandwidth are bounded under pressure, and everything
//! degrades gracefully when the collector is slow or absent. A span may
//! be dropped when queues overflow or the wire fails; the host
//! application is never failed and never blocked.
//!
//! # Sampling
//!
//! A [`Sampler`](sampler::Sampler) decides per `(trace_id, operation)`
//! whether a span should be recorded, and tags the decision so the
//! backend can reason about completeness. Strategies range from
//! [`ConstSampler`](sampler::ConstSampler) to an adaptive per-operation
//! mix of probabilistic sampling and guaranteed lower-bound rate limits,
//! optionally refreshed from a control plane by a
//! [`RemotelyControlledSampler`](sampler::RemotelyControlledSampler).
//!
//! # Reporting
//!
//! A [`Reporter`](reporter::Reporter) receives finished spans. The
//! production variant, [`RemoteReporter`](reporter::RemoteReporter),
//! enqueues them onto a bounded queue drained by a dedicated worker that
//! batches spans into an injected [`Transport`](transport::Transport) and
//! flushes on an interval. Back-pressure policy: producers win and the
//! network loses. A full queue drops the span and bumps a counter.
//!
//! # Example
//!
//! ```no_run
//! use std::time::{Duration, SystemTime};
//! use tracebound::reporter::{RemoteReporter, Reporter};
//! use tracebound::sampler::{ProbabilisticSampler, Sampler};
//! use tracebound::{SpanRecord, TraceId};
//! # use tracebound::transport::Transport;
//! # use tracebound::TransportError;
//! # #[derive(Debug)]
//! # struct UdpTransport;
//! # impl Transport for UdpTransport {
//! #     fn append(&mut self, _: SpanRecord) -> Result<usize, TransportError> { Ok(0) }
//! #     fn flush(&mut self) -> Result<usize, TransportError> { Ok(0) }
//! #     fn close(&mut self) {}
//! # }
//!
//! let sampler = Sampler::Probabilistic(ProbabilisticSampler::new(0.01));
//! let reporter = RemoteReporter::builder(UdpTransport)
//!     .with_flush_interval(Duration::from_secs(1))
//!     .build();
//!
//! let trace_id = TraceId::from_u128(0xdead_beef);
//! let status = sampler.is_sampled(trace_id, "get /api");
//! if status.is_sampled() {
//!     let span = SpanRecord::new(
//!         trace_id,
//!         "get /api",
//!         SystemTime::now(),
//!         Duration::from_millis(7),
//!     )
//!     .with_tags(status.into_tags());
//!     reporter.report(span);
//! }
//!
//! reporter.close().unwrap();
//! ```
//!
//! Diagnostics are emitted through the [`tracing`] macros; install any
//! `tracing` subscriber to see them.

#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]

mod common;
mod span;

pub mod error;
pub mod metrics;
pub mod reporter;
pub mod sampler;
pub mod transport;

pub use common::{Tag, TagValue, TraceId};
pub use error::{FetchError, PipelineError, PipelineResult, TransportError};
pub use span::SpanRecord;
