//! SinkHandle - manages a sink with isolated queue and worker task

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use contracts::{DataSink, MeasurementRecord, ThrottleKey};

use crate::metrics::SinkMetrics;
use crate::throttle::{RateLimiter, ThrottleDecision};

/// Handle to a running sink worker
///
/// The worker owns the sink and its `RateLimiter`, so one slow sink never
/// delays another.
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send records to worker
    tx: mpsc::UnboundedSender<MeasurementRecord>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Create a new SinkHandle and spawn the worker task
    pub fn spawn<S: DataSink + 'static>(sink: S, throttle_key: ThrottleKey) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();
        let limiter = RateLimiter::new(throttle_key);

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, limiter, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a record for the sink (never blocks)
    ///
    /// Returns false only if the worker is gone.
    pub fn send(&self, record: MeasurementRecord) -> bool {
        match self.tx.send(record) {
            Ok(()) => true,
            Err(_) => {
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the sink worker gracefully
    ///
    /// Queued records are still delivered before the sink is flushed and
    /// closed.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task: throttle, then write
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, limiter, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<MeasurementRecord>,
    mut limiter: RateLimiter,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, throttle_key = ?limiter.throttle_key(), "Sink worker started");

    while let Some(record) = rx.recv().await {
        let depth = rx.len();
        metrics.set_queue_len(depth);
        observability::record_sink_queue_depth(&name, depth);

        let now = chrono::Utc::now().timestamp();
        if limiter.check(&record, now) == ThrottleDecision::Suppress {
            metrics.inc_suppressed_count();
            observability::record_throttle_decision(&name, false);
            trace!(sink = %name, topic = %record.topic_path(), "Record suppressed by rate limit");
            continue;
        }
        observability::record_throttle_decision(&name, true);

        match sink.write(&record).await {
            Ok(()) => {
                metrics.inc_forwarded_count();
                observability::record_sink_write(&name, true);
            }
            Err(e) => {
                // At-most-once: the record is dropped
                metrics.inc_failure_count();
                observability::record_sink_write(&name, false);
                error!(
                    sink = %name,
                    topic = %record.topic_path(),
                    error = %e,
                    "Write failed"
                );
            }
        }
    }

    // Cleanup
    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
