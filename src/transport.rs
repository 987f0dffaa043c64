//! Collaborator seams for the byte-level shipping layer.
//!
//! The core never serializes spans or touches sockets. A [`Transport`]
//! owns both concerns: it converts each span to its wire form, buffers it,
//! and ships batches to the collector agent when a size or time threshold
//! is hit. Concrete implementations (thrift/protobuf encodings, UDP or
//! HTTP shipping) live outside this crate.

use std::io;

use crate::error::TransportError;
use crate::span::SpanRecord;

/// Serializes spans and ships batches to the collector agent.
///
/// The [`RemoteReporter`](crate::reporter::RemoteReporter) confines every
/// call to its single worker thread, so implementations need `Send` but
/// not `Sync`, and need not be reentrant.
pub trait Transport: Send {
    /// Buffer one span, possibly flushing if an internal threshold is hit.
    ///
    /// Returns the number of spans just sent over the wire: `0` while the
    /// batch is still accumulating, the batch size when this append
    /// triggered a flush.
    fn append(&mut self, span: SpanRecord) -> Result<usize, TransportError>;

    /// Force the current buffer onto the wire. Returns the number of spans
    /// sent.
    fn flush(&mut self) -> Result<usize, TransportError>;

    /// Release resources. Idempotent; the transport is never used again
    /// afterwards.
    fn close(&mut self);
}

/// The datagram seam consumed by UDP transport implementations.
///
/// One call ships one already-serialized batch payload. Implementations
/// are expected to be bound and connected ahead of time; payloads that
/// exceed the datagram size limit fail at this layer.
pub trait PacketSender: Send {
    /// Ship one serialized batch.
    fn send(&mut self, payload: &[u8]) -> io::Result<()>;
}
