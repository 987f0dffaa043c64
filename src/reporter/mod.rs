//! Reporters: sinks for finished spans.
//!
//! The set is open, so hosts may implement [`Reporter`] themselves, but
//! the built-in variants cover the usual needs: discard, buffer in memory
//! for tests, log, fan out, or batch onto the wire through
//! [`RemoteReporter`].

mod remote;

pub use remote::{RemoteReporter, RemoteReporterBuilder};

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::PipelineResult;
use crate::span::SpanRecord;

/// A sink for finished spans.
pub trait Reporter: Send + Sync + fmt::Debug {
    /// Accept one finished span. Must not block on I/O and must never
    /// fail the caller.
    fn report(&self, span: SpanRecord);

    /// Push any buffered spans onward. Default: nothing buffered, nothing
    /// to do.
    fn flush(&self) -> PipelineResult {
        Ok(())
    }

    /// Drain in-flight work and release resources. Idempotent; blocks
    /// until done or a deadline passes.
    fn close(&self) -> PipelineResult {
        Ok(())
    }
}

/// Discards every span.
#[derive(Debug, Default)]
pub struct NullReporter;

impl NullReporter {
    /// Create a reporter that discards everything.
    pub fn new() -> Self {
        NullReporter
    }
}

impl Reporter for NullReporter {
    fn report(&self, _span: SpanRecord) {}
}

/// Buffers spans in memory. A test and debugging aid.
///
/// Clones share the same buffer, so a handle kept by the test observes
/// spans reported through the clone handed to the pipeline.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReporter {
    spans: std::sync::Arc<Mutex<Vec<SpanRecord>>>,
}

impl InMemoryReporter {
    /// Create an empty in-memory reporter.
    pub fn new() -> Self {
        InMemoryReporter::default()
    }

    /// Number of spans reported so far.
    pub fn spans_submitted(&self) -> usize {
        self.lock_spans().len()
    }

    /// Snapshot of the reported spans, in report order.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.lock_spans().clone()
    }

    /// Forget everything reported so far.
    pub fn reset(&self) {
        self.lock_spans().clear();
    }

    fn lock_spans(&self) -> std::sync::MutexGuard<'_, Vec<SpanRecord>> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Reporter for InMemoryReporter {
    fn report(&self, span: SpanRecord) {
        self.lock_spans().push(span);
    }
}

/// Emits one log event per span through the ambient `tracing` dispatcher.
#[derive(Debug, Default)]
pub struct LoggingReporter;

impl LoggingReporter {
    /// Create a logging reporter.
    pub fn new() -> Self {
        LoggingReporter
    }
}

impl Reporter for LoggingReporter {
    fn report(&self, span: SpanRecord) {
        tracing::info!(
            trace_id = %span.trace_id(),
            operation = span.operation_name(),
            duration_us = span.duration().as_micros() as u64,
            "span finished"
        );
    }
}

/// Fans each span out to an ordered sequence of child reporters.
///
/// Children are invoked sequentially; each call completes before the
/// next starts. `flush` and `close` visit every child even when one
/// errors: errors are logged and the first one is returned after the
/// full fan-out.
#[derive(Debug)]
pub struct CompositeReporter {
    children: Vec<Box<dyn Reporter>>,
}

impl CompositeReporter {
    /// Create a composite over the given children.
    pub fn new(children: Vec<Box<dyn Reporter>>) -> Self {
        CompositeReporter { children }
    }
}

impl Reporter for CompositeReporter {
    fn report(&self, span: SpanRecord) {
        for child in &self.children {
            child.report(span.clone());
        }
    }

    fn flush(&self) -> PipelineResult {
        let mut first_error = None;
        for child in &self.children {
            if let Err(error) = child.flush() {
                tracing::warn!(%error, "child reporter flush failed");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn close(&self) -> PipelineResult {
        let mut first_error = None;
        for child in &self.children {
            if let Err(error) = child.close() {
                tracing::warn!(%error, "child reporter close failed");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::span::tests::test_span;

    #[test]
    fn null_reporter_accepts_everything() {
        let reporter = NullReporter::new();
        for _ in 0..100 {
            reporter.report(test_span("op"));
        }
        assert!(reporter.close().is_ok());
    }

    #[test]
    fn logging_reporter_accepts_everything() {
        let reporter = LoggingReporter::new();
        for _ in 0..100 {
            reporter.report(test_span("op"));
        }
        assert!(reporter.close().is_ok());
    }

    #[test]
    fn in_memory_reporter_stores_and_resets() {
        let reporter = InMemoryReporter::new();
        for _ in 0..100 {
            reporter.report(test_span("op"));
        }
        assert_eq!(reporter.spans_submitted(), 100);
        reporter.reset();
        assert_eq!(reporter.spans_submitted(), 0);
        assert!(reporter.close().is_ok());
    }

    #[test]
    fn clones_share_the_buffer() {
        let reporter = InMemoryReporter::new();
        let observer = reporter.clone();
        reporter.report(test_span("op"));
        assert_eq!(observer.spans_submitted(), 1);
        assert_eq!(observer.spans()[0].operation_name(), "op");
    }

    #[test]
    fn composite_advances_every_child_by_one() {
        let first = InMemoryReporter::new();
        let second = InMemoryReporter::new();
        let composite = CompositeReporter::new(vec![
            Box::new(first.clone()),
            Box::new(second.clone()),
        ]);

        composite.report(test_span("op"));
        assert_eq!(first.spans_submitted(), 1);
        assert_eq!(second.spans_submitted(), 1);
    }

    #[derive(Debug)]
    struct FailingReporter;

    impl Reporter for FailingReporter {
        fn report(&self, _span: SpanRecord) {}

        fn close(&self) -> PipelineResult {
            Err(PipelineError::InternalFailure("nope".to_owned()))
        }
    }

    #[test]
    fn composite_close_visits_every_child_despite_errors() {
        let tail = InMemoryReporter::new();
        let composite = CompositeReporter::new(vec![
            Box::new(FailingReporter),
            Box::new(tail.clone()),
        ]);

        composite.report(test_span("op"));
        let result = composite.close();
        assert!(matches!(result, Err(PipelineError::InternalFailure(_))));
        // The failing child did not stop the fan-out.
        assert_eq!(tail.spans_submitted(), 1);
    }
}
