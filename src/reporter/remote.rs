use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, SendTimeoutError};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::ReporterMetrics;
use crate::reporter::Reporter;
use crate::span::SpanRecord;
use crate::transport::Transport;

/// Queue capacity override, in spans.
const REPORTER_QUEUE_SIZE_ENV: &str = "TRACEBOUND_REPORTER_QUEUE_SIZE";
/// Flush interval override, in milliseconds.
const REPORTER_FLUSH_INTERVAL_ENV: &str = "TRACEBOUND_REPORTER_FLUSH_INTERVAL";

const DEFAULT_QUEUE_CAPACITY: usize = 100;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_millis(1);
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands consumed by the worker, in FIFO order. Close is a terminal
/// sentinel in the same queue as the spans, so everything enqueued before
/// it is drained first.
enum Command {
    Span(SpanRecord),
    Flush(crossbeam_channel::Sender<PipelineResult>),
    Close(crossbeam_channel::Sender<PipelineResult>),
}

/// Batches finished spans onto a [`Transport`] from a dedicated worker
/// thread.
///
/// `report` enqueues onto a bounded queue and returns; it waits at most
/// the configured enqueue timeout when the queue is full, then drops the
/// span and counts it. Producers win, the network loses. The worker
/// drains the queue, hands spans to the transport, and forces a flush
/// every flush interval.
///
/// A successful [`close`](Reporter::close) guarantees every span accepted
/// before close began was either handed to the transport or counted as
/// dropped.
#[derive(Debug)]
pub struct RemoteReporter {
    sender: crossbeam_channel::Sender<Command>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    closed: AtomicBool,
    queue_depth: Arc<AtomicUsize>,
    metrics: Arc<ReporterMetrics>,
    enqueue_timeout: Duration,
    close_timeout: Duration,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Span(span) => f.debug_tuple("Span").field(&span.operation_name()).finish(),
            Command::Flush(_) => f.write_str("Flush"),
            Command::Close(_) => f.write_str("Close"),
        }
    }
}

impl RemoteReporter {
    /// Start configuring a reporter around the given transport.
    pub fn builder<T>(transport: T) -> RemoteReporterBuilder
    where
        T: Transport + 'static,
    {
        RemoteReporterBuilder {
            transport: Box::new(transport),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            metrics: None,
        }
        .init_from_env_vars()
    }

    /// The reporter's counters.
    pub fn metrics(&self) -> Arc<ReporterMetrics> {
        Arc::clone(&self.metrics)
    }

    fn drop_spans(&self, count: u64) {
        if self.metrics.add_dropped(count) == 0 {
            tracing::warn!(
                "reporter queue full; dropping spans. Further drops are counted \
                 silently and the total is reported at close"
            );
        }
    }
}

impl Reporter for RemoteReporter {
    fn report(&self, span: SpanRecord) {
        self.metrics.add_submitted(1);
        if self.closed.load(Ordering::Acquire) {
            self.drop_spans(1);
            return;
        }
        match self
            .sender
            .send_timeout(Command::Span(span), self.enqueue_timeout)
        {
            Ok(()) => {
                self.queue_depth.fetch_add(1, Ordering::Relaxed);
            }
            Err(SendTimeoutError::Timeout(_)) | Err(SendTimeoutError::Disconnected(_)) => {
                self.drop_spans(1);
            }
        }
    }

    fn flush(&self) -> PipelineResult {
        if self.closed.load(Ordering::Acquire) {
            return Err(PipelineError::AlreadyClosed);
        }
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.sender
            .send_timeout(Command::Flush(ack_tx), self.enqueue_timeout)
            .map_err(|_| {
                PipelineError::InternalFailure("reporter queue unavailable".to_owned())
            })?;
        ack_rx
            .recv_timeout(self.close_timeout)
            .unwrap_or(Err(PipelineError::Timeout(self.close_timeout)))
    }

    fn close(&self) -> PipelineResult {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let dropped = self.metrics.spans_dropped();
        if dropped > 0 {
            tracing::warn!(
                dropped_spans = dropped,
                "spans were dropped on a full queue during this reporter's lifetime; \
                 consider a larger queue or a shorter flush interval"
            );
        }
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self
            .sender
            .send_timeout(Command::Close(ack_tx), self.close_timeout)
            .is_err()
        {
            return Err(PipelineError::InternalFailure(
                "reporter worker unreachable".to_owned(),
            ));
        }
        match ack_rx.recv_timeout(self.close_timeout) {
            Ok(result) => {
                let handle = self
                    .handle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(handle) = handle {
                    let _ = handle.join();
                }
                result
            }
            Err(_) => {
                let stranded = self.queue_depth.load(Ordering::Relaxed) as u64;
                if stranded > 0 {
                    self.drop_spans(stranded);
                }
                tracing::error!(
                    timeout = ?self.close_timeout,
                    stranded_spans = stranded,
                    "reporter worker did not drain in time"
                );
                Err(PipelineError::Timeout(self.close_timeout))
            }
        }
    }
}

impl Drop for RemoteReporter {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            let _ = self.close();
        }
    }
}

/// Builder for [`RemoteReporter`].
///
/// Defaults come from the environment where set
/// (`TRACEBOUND_REPORTER_QUEUE_SIZE`, `TRACEBOUND_REPORTER_FLUSH_INTERVAL`
/// in milliseconds); programmatic configuration overrides both.
pub struct RemoteReporterBuilder {
    transport: Box<dyn Transport>,
    queue_capacity: usize,
    flush_interval: Duration,
    enqueue_timeout: Duration,
    close_timeout: Duration,
    metrics: Option<Arc<ReporterMetrics>>,
}

impl fmt::Debug for RemoteReporterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteReporterBuilder")
            .field("queue_capacity", &self.queue_capacity)
            .field("flush_interval", &self.flush_interval)
            .field("enqueue_timeout", &self.enqueue_timeout)
            .field("close_timeout", &self.close_timeout)
            .finish()
    }
}

impl RemoteReporterBuilder {
    /// Maximum number of queued commands. When the queue is full, spans
    /// are dropped and counted. Defaults to 100.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// How often the worker forces a transport flush. Defaults to 1
    /// second.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// How long `report` may wait for queue space before dropping the
    /// span. Defaults to 1 millisecond.
    pub fn with_enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    /// Grace period for `flush` and `close` to complete. Defaults to 5
    /// seconds.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Share a counter handle instead of creating a fresh one.
    pub fn with_metrics(mut self, metrics: Arc<ReporterMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn the worker and return the reporter.
    pub fn build(self) -> RemoteReporter {
        let (sender, receiver) = crossbeam_channel::bounded(self.queue_capacity);
        let queue_depth = Arc::new(AtomicUsize::new(0));
        let metrics = self.metrics.unwrap_or_default();

        let worker_depth = Arc::clone(&queue_depth);
        let worker_metrics = Arc::clone(&metrics);
        let transport = self.transport;
        let flush_interval = self.flush_interval;
        let handle = thread::Builder::new()
            .name("tracebound-reporter".to_string())
            .spawn(move || {
                run_worker(receiver, transport, flush_interval, worker_depth, worker_metrics)
            })
            .expect("failed to spawn reporter worker thread");

        RemoteReporter {
            sender,
            handle: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
            queue_depth,
            metrics,
            enqueue_timeout: self.enqueue_timeout,
            close_timeout: self.close_timeout,
        }
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(capacity) = env::var(REPORTER_QUEUE_SIZE_ENV)
            .ok()
            .and_then(|value| usize::from_str(&value).ok())
        {
            self.queue_capacity = capacity.max(1);
        }
        if let Some(millis) = env::var(REPORTER_FLUSH_INTERVAL_ENV)
            .ok()
            .and_then(|value| u64::from_str(&value).ok())
        {
            self.flush_interval = Duration::from_millis(millis);
        }
        self
    }
}

fn run_worker(
    receiver: crossbeam_channel::Receiver<Command>,
    mut transport: Box<dyn Transport>,
    flush_interval: Duration,
    queue_depth: Arc<AtomicUsize>,
    metrics: Arc<ReporterMetrics>,
) {
    let mut last_flush = Instant::now();
    loop {
        let remaining = flush_interval
            .checked_sub(last_flush.elapsed())
            .unwrap_or(Duration::ZERO);
        match receiver.recv_timeout(remaining) {
            Ok(Command::Span(span)) => {
                queue_depth.fetch_sub(1, Ordering::Relaxed);
                append_span(transport.as_mut(), span, &metrics, &mut last_flush);
            }
            Ok(Command::Flush(ack)) => {
                let result = flush_transport(transport.as_mut(), &metrics);
                last_flush = Instant::now();
                let _ = ack.send(result);
            }
            Ok(Command::Close(ack)) => {
                // No new spans are admitted once the closed flag is up;
                // drain what is already queued, flush, and stop.
                let mut waiters = Vec::new();
                while let Ok(command) = receiver.try_recv() {
                    match command {
                        Command::Span(span) => {
                            queue_depth.fetch_sub(1, Ordering::Relaxed);
                            append_span(transport.as_mut(), span, &metrics, &mut last_flush);
                        }
                        Command::Flush(waiter) | Command::Close(waiter) => waiters.push(waiter),
                    }
                }
                let result = flush_transport(transport.as_mut(), &metrics);
                transport.close();
                for waiter in waiters {
                    let _ = waiter.send(result.clone());
                }
                let _ = ack.send(result);
                tracing::debug!("reporter worker exiting");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                let _ = flush_transport(transport.as_mut(), &metrics);
                last_flush = Instant::now();
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Every handle is gone; ship what we have and stop.
                let _ = flush_transport(transport.as_mut(), &metrics);
                transport.close();
                break;
            }
        }
    }
}

fn append_span(
    transport: &mut dyn Transport,
    span: SpanRecord,
    metrics: &ReporterMetrics,
    last_flush: &mut Instant,
) {
    match transport.append(span) {
        Ok(0) => {}
        Ok(sent) => {
            // The append tripped the transport's own batch threshold; a
            // fresh batch just left, so restart the flush clock.
            metrics.add_sent(sent as u64);
            *last_flush = Instant::now();
        }
        Err(error) => {
            metrics.add_transport_failed(1);
            tracing::warn!(%error, "transport rejected span");
        }
    }
}

fn flush_transport(transport: &mut dyn Transport, metrics: &ReporterMetrics) -> PipelineResult {
    match transport.flush() {
        Ok(0) => Ok(()),
        Ok(sent) => {
            metrics.add_sent(sent as u64);
            Ok(())
        }
        Err(error) => {
            metrics.add_batch_failed();
            tracing::warn!(%error, "batch flush failed");
            Err(PipelineError::InternalFailure(error.to_string()))
        }
    }
}
