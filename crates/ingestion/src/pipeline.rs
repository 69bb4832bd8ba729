//! Ingestion Pipeline main entry

use std::sync::Arc;

use async_channel::{unbounded, Receiver, Sender};
use contracts::MeasurementRecord;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;
use crate::producer::MeasurementProducer;

/// Handle given to producers for placing records on the measurement queue
#[derive(Clone)]
pub struct RecordEmitter {
    tx: Sender<MeasurementRecord>,
    metrics: Arc<IngestionMetrics>,
}

impl RecordEmitter {
    /// Enqueue one record
    ///
    /// The queue is unbounded, so this never waits. It only fails once every
    /// receiver is gone.
    pub fn emit(&self, record: MeasurementRecord) -> Result<()> {
        let source = record.source.clone();
        self.tx
            .try_send(record)
            .map_err(|_| IngestionError::ChannelClosed {
                source_name: source.clone(),
            })?;
        self.metrics.record_emitted();
        observability::record_measurement_emitted(&source);
        Ok(())
    }

    /// Shared metrics of the owning pipeline
    pub fn metrics(&self) -> &IngestionMetrics {
        &self.metrics
    }
}

/// Outcome of one finished producer task
#[derive(Debug)]
pub struct ProducerExit {
    pub name: String,
    pub result: Result<()>,
}

/// Ingestion Pipeline
///
/// Owns the measurement queue and the structured set of producer tasks.
pub struct IngestionPipeline {
    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Queue sender (cloned into every emitter)
    tx: Sender<MeasurementRecord>,

    /// Queue receiver
    rx: Option<Receiver<MeasurementRecord>>,

    /// Running producers
    tasks: JoinSet<ProducerExit>,

    /// Cancels every producer of this pipeline
    cancel: CancellationToken,
}

impl IngestionPipeline {
    /// Create new Ingestion Pipeline with its own cancellation token
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Create a pipeline whose producers stop when `parent` is cancelled
    pub fn with_cancellation(parent: CancellationToken) -> Self {
        let (tx, rx) = unbounded();

        Self {
            metrics: Arc::new(IngestionMetrics::new()),
            tx,
            rx: Some(rx),
            tasks: JoinSet::new(),
            cancel: parent.child_token(),
        }
    }

    /// Create an emitter bound to this pipeline's queue
    pub fn emitter(&self) -> RecordEmitter {
        RecordEmitter {
            tx: self.tx.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Spawn a producer onto the task set
    #[instrument(name = "ingestion_spawn_producer", skip_all, fields(producer = %producer.name()))]
    pub fn spawn<P>(&mut self, mut producer: P)
    where
        P: MeasurementProducer + Send + 'static,
    {
        let name = producer.name().to_string();
        let emitter = self.emitter();
        let cancel = self.cancel.clone();

        self.tasks.spawn(async move {
            let result = producer.run(emitter, cancel).await;
            ProducerExit { name, result }
        });
        debug!(count = self.tasks.len(), "producer spawned");
    }

    /// Wait for the next producer to finish
    ///
    /// Returns `None` when no producer is running. A panicked task is
    /// reported as `TaskFailed`.
    pub async fn next_exit(&mut self) -> Option<ProducerExit> {
        let joined = self.tasks.join_next().await?;
        Some(match joined {
            Ok(exit) => exit,
            Err(e) => ProducerExit {
                name: "unknown".to_string(),
                result: Err(IngestionError::TaskFailed {
                    producer: "unknown".to_string(),
                    message: e.to_string(),
                }),
            },
        })
    }

    /// Cancel every producer and wait for all of them
    #[instrument(name = "ingestion_shutdown", skip(self))]
    pub async fn shutdown(&mut self) -> Vec<ProducerExit> {
        info!(count = self.tasks.len(), "stopping producers");
        self.cancel.cancel();

        let mut exits = Vec::new();
        while let Some(exit) = self.next_exit().await {
            if let Err(ref e) = exit.result {
                warn!(producer = %exit.name, error = %e, "producer stopped with error");
            }
            exits.push(exit);
        }
        exits
    }

    /// Get data stream receiver
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<MeasurementRecord>> {
        self.rx.take()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Number of producers still running
    pub fn producer_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancellation token shared by the producers
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::MeasurementValue;

    struct CountingProducer {
        count: u32,
    }

    impl MeasurementProducer for CountingProducer {
        fn name(&self) -> &str {
            "counter"
        }

        async fn run(&mut self, emitter: RecordEmitter, cancel: CancellationToken) -> Result<()> {
            for i in 0..self.count {
                emitter.emit(MeasurementRecord::new("test", "el", "n", i64::from(i), 0))?;
            }
            cancel.cancelled().await;
            Ok(())
        }
    }

    struct FailingProducer;

    impl MeasurementProducer for FailingProducer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(&mut self, _emitter: RecordEmitter, _cancel: CancellationToken) -> Result<()> {
            Err(IngestionError::SerialOpen {
                port: "/dev/null0".to_string(),
                message: "no such device".to_string(),
            })
        }
    }

    #[test]
    fn test_take_receiver_once() {
        let mut pipeline = IngestionPipeline::new();
        assert!(pipeline.take_receiver().is_some());
        assert!(pipeline.take_receiver().is_none());
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let mut pipeline = IngestionPipeline::new();
        drop(pipeline.take_receiver());
        let err = pipeline
            .emitter()
            .emit(MeasurementRecord::new("dsmr", "el", "x", 1i64, 0))
            .unwrap_err();
        assert!(matches!(err, IngestionError::ChannelClosed { .. }));
    }

    #[tokio::test]
    async fn test_producer_records_in_order() {
        let mut pipeline = IngestionPipeline::new();
        let rx = pipeline.take_receiver().unwrap();
        pipeline.spawn(CountingProducer { count: 3 });

        for expected in 0..3i64 {
            let record = rx.recv().await.unwrap();
            assert_eq!(record.value, MeasurementValue::Int(expected));
        }

        let exits = pipeline.shutdown().await;
        assert_eq!(exits.len(), 1);
        assert!(exits[0].result.is_ok());
        assert_eq!(pipeline.metrics().snapshot().records_emitted, 3);
    }

    #[tokio::test]
    async fn test_failing_producer_reported() {
        let mut pipeline = IngestionPipeline::new();
        pipeline.spawn(FailingProducer);

        let exit = pipeline.next_exit().await.unwrap();
        assert_eq!(exit.name, "failing");
        assert!(matches!(exit.result, Err(IngestionError::SerialOpen { .. })));
        assert!(pipeline.next_exit().await.is_none());
    }

    #[tokio::test]
    async fn test_parent_cancellation_stops_producers() {
        let root = CancellationToken::new();
        let mut pipeline = IngestionPipeline::with_cancellation(root.clone());
        let _rx = pipeline.take_receiver();
        pipeline.spawn(CountingProducer { count: 0 });

        root.cancel();
        let exit = pipeline.next_exit().await.unwrap();
        assert!(exit.result.is_ok());
    }
}
