use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::common::TraceId;
use crate::metrics::SamplerMetrics;
use crate::sampler::strategy::{StrategyFetcher, StrategyResponse};
use crate::sampler::{
    AdaptiveSampler, ProbabilisticSampler, RateLimitingSampler, Sampler, SamplingStatus,
};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_MAX_OPERATIONS: usize = 2000;
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default probability when no initial sampler is supplied.
const DEFAULT_SAMPLING_PROBABILITY: f64 = 0.001;

/// A sampler whose strategy is periodically refreshed from the control
/// plane.
///
/// A background thread polls the injected [`StrategyFetcher`] every poll
/// interval and swaps or updates the active delegate sampler accordingly.
/// Decisions always observe either the previous or the new delegate,
/// never a partially-updated one; a captured delegate stays alive until
/// the decision that captured it finishes.
#[derive(Debug)]
pub struct RemotelyControlledSampler {
    cell: Arc<SamplerCell>,
    shutdown_tx: crossbeam_channel::Sender<()>,
    done_rx: crossbeam_channel::Receiver<()>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    close_timeout: Duration,
}

#[derive(Debug)]
struct SamplerCell {
    service_name: String,
    max_operations: usize,
    delegate: RwLock<Arc<Sampler>>,
    closed: AtomicBool,
    metrics: Arc<SamplerMetrics>,
}

impl SamplerCell {
    fn apply(&self, response: StrategyResponse) {
        match (
            response.probabilistic_sampling,
            response.rate_limiting_sampling,
            response.operation_sampling,
        ) {
            (Some(probabilistic), None, None) => {
                self.replace_delegate(Sampler::Probabilistic(ProbabilisticSampler::new(
                    probabilistic.sampling_rate,
                )));
            }
            (None, Some(rate_limiting), None) => {
                {
                    let delegate = self.read_delegate();
                    if let Sampler::RateLimiting(sampler) = delegate.as_ref() {
                        sampler.update(rate_limiting.max_traces_per_second);
                        self.metrics.add_update();
                        return;
                    }
                }
                self.replace_delegate(Sampler::RateLimiting(RateLimitingSampler::new(
                    rate_limiting.max_traces_per_second,
                )));
            }
            (None, None, Some(operations)) => {
                {
                    let delegate = self.read_delegate();
                    if let Sampler::Adaptive(sampler) = delegate.as_ref() {
                        sampler.update(&operations);
                        self.metrics.add_update();
                        return;
                    }
                }
                self.replace_delegate(Sampler::Adaptive(AdaptiveSampler::new(
                    &operations,
                    self.max_operations,
                )));
            }
            _ => {
                tracing::warn!(
                    service = %self.service_name,
                    "strategy response did not set exactly one strategy; keeping current sampler"
                );
            }
        }
    }

    fn replace_delegate(&self, sampler: Sampler) {
        let mut delegate = self
            .delegate
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *delegate = Arc::new(sampler);
        drop(delegate);
        self.metrics.add_update();
    }

    fn read_delegate(&self) -> Arc<Sampler> {
        Arc::clone(&self.delegate.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl RemotelyControlledSampler {
    /// Start configuring a remotely-controlled sampler for `service_name`.
    pub fn builder<F>(
        service_name: impl Into<String>,
        fetcher: F,
    ) -> RemotelyControlledSamplerBuilder<F>
    where
        F: StrategyFetcher,
    {
        RemotelyControlledSamplerBuilder {
            service_name: service_name.into(),
            fetcher,
            initial_sampler: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_operations: DEFAULT_MAX_OPERATIONS,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            metrics: None,
        }
    }

    /// Shared counters for refresh successes and failures.
    pub fn metrics(&self) -> Arc<SamplerMetrics> {
        Arc::clone(&self.cell.metrics)
    }

    pub(crate) fn is_sampled(&self, trace_id: TraceId, operation_name: &str) -> SamplingStatus {
        if self.cell.closed.load(Ordering::Acquire) {
            // Documented close policy: decisions after close are
            // not-sampled with no tags.
            return SamplingStatus::new(false, Vec::new());
        }
        let delegate = self.cell.read_delegate();
        delegate.is_sampled(trace_id, operation_name)
    }

    /// Stop the refresher. Waits up to the close timeout for the thread to
    /// acknowledge; a thread stuck in an in-flight fetch is detached and
    /// its result discarded. Idempotent.
    pub fn close(&self) {
        if self.cell.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown_tx.try_send(());
        match self.done_rx.recv_timeout(self.close_timeout) {
            Ok(()) => {
                let handle = self
                    .handle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(handle) = handle {
                    let _ = handle.join();
                }
            }
            Err(_) => {
                tracing::warn!(
                    service = %self.cell.service_name,
                    timeout = ?self.close_timeout,
                    "strategy refresher did not stop in time; detaching"
                );
            }
        }
    }
}

impl Drop for RemotelyControlledSampler {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for [`RemotelyControlledSampler`].
#[derive(Debug)]
pub struct RemotelyControlledSamplerBuilder<F> {
    service_name: String,
    fetcher: F,
    initial_sampler: Option<Sampler>,
    poll_interval: Duration,
    max_operations: usize,
    close_timeout: Duration,
    metrics: Option<Arc<SamplerMetrics>>,
}

impl<F> RemotelyControlledSamplerBuilder<F>
where
    F: StrategyFetcher,
{
    /// The sampler used until the first strategy response arrives (and
    /// kept for good if the control plane never answers). Defaults to a
    /// probabilistic sampler at 0.001.
    pub fn with_initial_sampler(mut self, sampler: Sampler) -> Self {
        self.initial_sampler = Some(sampler);
        self
    }

    /// How often to poll the control plane. Defaults to 60 seconds; the
    /// first poll happens one interval after construction.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Per-operation entry cap handed to adaptive delegates. Defaults to
    /// 2000.
    pub fn with_max_operations(mut self, max_operations: usize) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// How long `close` waits for the refresher to stop. Defaults to 5
    /// seconds.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Share a counter handle instead of creating a fresh one.
    pub fn with_metrics(mut self, metrics: Arc<SamplerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn the refresher and return the sampler.
    pub fn build(self) -> Sampler {
        let initial = self.initial_sampler.unwrap_or_else(|| {
            Sampler::Probabilistic(ProbabilisticSampler::new(DEFAULT_SAMPLING_PROBABILITY))
        });
        let cell = Arc::new(SamplerCell {
            service_name: self.service_name,
            max_operations: self.max_operations,
            delegate: RwLock::new(Arc::new(initial)),
            closed: AtomicBool::new(false),
            metrics: self.metrics.unwrap_or_default(),
        });

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let fetcher = self.fetcher;
        let poll_interval = self.poll_interval;
        let refresher_cell = Arc::clone(&cell);
        let handle = thread::Builder::new()
            .name("tracebound-sampler-refresh".to_string())
            .spawn(move || {
                run_refresher(refresher_cell, fetcher, poll_interval, shutdown_rx, done_tx)
            })
            .expect("failed to spawn strategy refresher thread");

        Sampler::RemotelyControlled(RemotelyControlledSampler {
            cell,
            shutdown_tx,
            done_rx,
            handle: Mutex::new(Some(handle)),
            close_timeout: self.close_timeout,
        })
    }
}

fn run_refresher<F>(
    cell: Arc<SamplerCell>,
    fetcher: F,
    poll_interval: Duration,
    shutdown_rx: crossbeam_channel::Receiver<()>,
    done_tx: crossbeam_channel::Sender<()>,
) where
    F: StrategyFetcher,
{
    loop {
        match shutdown_rx.recv_timeout(poll_interval) {
            Err(RecvTimeoutError::Timeout) => {
                let result = fetcher.fetch(&cell.service_name);
                if cell.closed.load(Ordering::Acquire) {
                    // Closed while the fetch was in flight; discard.
                    break;
                }
                match result {
                    Ok(response) => cell.apply(response),
                    Err(error) => {
                        cell.metrics.add_fetch_failure();
                        tracing::warn!(
                            service = %cell.service_name,
                            %error,
                            "strategy fetch failed; keeping current sampler"
                        );
                    }
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let _ = done_tx.try_send(());
}
