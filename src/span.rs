//! The finished-span record consumed by reporters and transports.

use std::time::{Duration, SystemTime};

use crate::common::{Tag, TraceId};

/// An immutable record of one finished unit of work.
///
/// The surrounding tracer owns span construction, context propagation and
/// clock acquisition; by the time a record reaches a
/// [`Reporter`](crate::reporter::Reporter) it is complete and never mutated
/// again.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanRecord {
    trace_id: TraceId,
    operation_name: String,
    start_time: SystemTime,
    duration: Duration,
    tags: Vec<Tag>,
}

impl SpanRecord {
    /// Create a finished span record.
    pub fn new(
        trace_id: TraceId,
        operation_name: impl Into<String>,
        start_time: SystemTime,
        duration: Duration,
    ) -> Self {
        SpanRecord {
            trace_id,
            operation_name: operation_name.into(),
            start_time,
            duration,
            tags: Vec::new(),
        }
    }

    /// Attach tags to the record.
    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    /// The trace this span belongs to.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The operation (endpoint, span name) this span recorded.
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Wall-clock start time.
    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    /// Elapsed duration of the unit of work.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Span tags, including any sampling decision tags.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A minimal finished span for reporter and transport tests.
    pub(crate) fn test_span(operation_name: &str) -> SpanRecord {
        SpanRecord::new(
            TraceId::from_u128(1),
            operation_name,
            SystemTime::now(),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn record_carries_its_fields() {
        let span = test_span("get /api").with_tags(vec![Tag::new("component", "http")]);
        assert_eq!(span.operation_name(), "get /api");
        assert_eq!(span.trace_id(), TraceId::from_u128(1));
        assert_eq!(span.tags().len(), 1);
        assert_eq!(span.tags()[0].key(), "component");
    }
}
