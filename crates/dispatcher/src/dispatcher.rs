//! Dispatcher - main loop for fan-out to sinks

use async_channel::Receiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use contracts::{InfluxConfig, LoggerBlueprint, MeasurementRecord, MqttConfig, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{InfluxSink, LogSink, MqttSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
    /// Broker settings for `mqtt` sinks
    pub mqtt: MqttConfig,
    /// Database settings for `influxdb` sinks
    pub influxdb: InfluxConfig,
    /// Replace every sink with a `LogSink` of the same name
    pub dry_run: bool,
}

impl DispatcherConfig {
    pub fn from_blueprint(blueprint: &LoggerBlueprint, dry_run: bool) -> Self {
        Self {
            sinks: blueprint.sinks.clone(),
            mqtt: blueprint.mqtt.clone(),
            influxdb: blueprint.influxdb.clone(),
            dry_run,
        }
    }
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: Receiver<MeasurementRecord>,
    cancel: CancellationToken,
}

impl DispatcherBuilder {
    /// Create a new DispatcherBuilder
    pub fn new(config: DispatcherConfig, input_rx: Receiver<MeasurementRecord>) -> Self {
        Self {
            config,
            input_rx,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the dispatcher when `cancel` fires
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build and start the sink workers
    #[instrument(name = "dispatcher_builder_build", skip(self))]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        if self.config.sinks.is_empty() {
            return Err(DispatcherError::NoSinks);
        }

        let handles = self
            .config
            .sinks
            .iter()
            .map(|sink| create_sink_handle(sink, &self.config))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
            cancel: self.cancel,
        })
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(sink, config),
    fields(sink = %sink.name, sink_type = ?sink.sink_type)
)]
fn create_sink_handle(
    sink: &SinkConfig,
    config: &DispatcherConfig,
) -> Result<SinkHandle, DispatcherError> {
    let throttle_key = sink.effective_throttle_key();
    if sink.name.is_empty() {
        return Err(DispatcherError::sink_creation(&sink.name, "empty sink name"));
    }

    if config.dry_run {
        return Ok(SinkHandle::spawn(LogSink::new(&sink.name), throttle_key));
    }

    let handle = match sink.sink_type {
        SinkType::Log => SinkHandle::spawn(LogSink::new(&sink.name), throttle_key),
        SinkType::Mqtt => SinkHandle::spawn(MqttSink::new(&sink.name, &config.mqtt), throttle_key),
        SinkType::Influxdb => {
            SinkHandle::spawn(InfluxSink::new(&sink.name, &config.influxdb), throttle_key)
        }
    };
    Ok(handle)
}

/// Final statistics of one dispatcher run
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Records read from the measurement queue
    pub records: u64,
    /// Per-sink metrics after the workers drained
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

/// The main Dispatcher that fans out records to sinks
///
/// Every record reaches every sink (broadcast); each sink throttles on its
/// own.
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: Receiver<MeasurementRecord>,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles (for testing)
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: Receiver<MeasurementRecord>) -> Self {
        Self {
            handles,
            input_rx,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the dispatcher when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run the dispatcher main loop
    ///
    /// Returns when the input channel is closed or the token is cancelled.
    /// On cancellation the records already queued are still dispatched, then
    /// every sink worker drains, flushes and closes.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> DispatchReport {
        info!(sinks = self.handles.len(), "Dispatcher started");

        let mut record_count: u64 = 0;

        loop {
            let record = tokio::select! {
                _ = self.cancel.cancelled() => break,
                record = self.input_rx.recv() => match record {
                    Ok(record) => record,
                    Err(_) => break,
                },
            };
            record_count += 1;
            self.dispatch_record(record);

            if record_count.is_multiple_of(1000) {
                debug!(records = record_count, "Dispatcher progress");
            }
        }

        while let Ok(record) = self.input_rx.try_recv() {
            record_count += 1;
            self.dispatch_record(record);
        }

        info!(records = record_count, "Dispatcher input closed, shutting down");

        let metrics: Vec<_> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().clone()))
            .collect();
        Self::shutdown_handles(std::mem::take(&mut self.handles)).await;

        info!("Dispatcher shutdown complete");

        DispatchReport {
            records: record_count,
            sinks: metrics
                .into_iter()
                .map(|(name, m)| (name, m.snapshot()))
                .collect(),
        }
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<DispatchReport> {
        tokio::spawn(self.run())
    }

    fn dispatch_record(&self, record: MeasurementRecord) {
        for handle in &self.handles {
            handle.send(record.clone());
        }
    }

    async fn shutdown_handles(handles: Vec<SinkHandle>) {
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

/// Convenience function to create a dispatcher from the blueprint
#[instrument(name = "dispatcher_create", skip(blueprint, input_rx, cancel))]
pub fn create_dispatcher(
    blueprint: &LoggerBlueprint,
    input_rx: Receiver<MeasurementRecord>,
    cancel: CancellationToken,
    dry_run: bool,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig::from_blueprint(blueprint, dry_run);
    DispatcherBuilder::new(config, input_rx)
        .cancellation(cancel)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DataSink, ContractError, ThrottleKey};
    use std::sync::{Arc, Mutex};

    /// Sink that remembers what it got
    struct RecordingSink {
        name: String,
        seen: Arc<Mutex<Vec<MeasurementRecord>>>,
    }

    impl DataSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, record: &MeasurementRecord) -> Result<(), ContractError> {
            self.seen.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn recording(name: &str, key: ThrottleKey) -> (SinkHandle, Arc<Mutex<Vec<MeasurementRecord>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            name: name.to_string(),
            seen: Arc::clone(&seen),
        };
        (SinkHandle::spawn(sink, key), seen)
    }

    fn blueprint() -> LoggerBlueprint {
        config_blueprint(vec![SinkConfig::new("console", SinkType::Log)])
    }

    fn config_blueprint(sinks: Vec<SinkConfig>) -> LoggerBlueprint {
        LoggerBlueprint {
            version: Default::default(),
            mqtt: MqttConfig {
                server: "localhost".to_string(),
                port: 1883,
                user: String::new(),
                password: String::new(),
                client_id: "solar_pi".to_string(),
            },
            devices: contracts::DevicesConfig {
                dsmr_port: "/dev/ttyUSB0".to_string(),
                sun2k_port: "/dev/ttyUSB1".to_string(),
            },
            influxdb: InfluxConfig {
                url: "http://localhost:8086".to_string(),
                token: "token".to_string(),
                bucket_id: "energy".to_string(),
                org: "home".to_string(),
            },
            dsmr: Default::default(),
            sun2000: Default::default(),
            sinks,
        }
    }

    #[tokio::test]
    async fn test_dispatcher_broadcasts() {
        let (input_tx, input_rx) = async_channel::unbounded();

        let (by_topic, topic_seen) = recording("mqtt", ThrottleKey::Topic);
        let (by_prefix, prefix_seen) = recording("influxdb", ThrottleKey::Prefix);

        let dispatcher = Dispatcher::with_handles(vec![by_topic, by_prefix], input_rx);
        let handle = dispatcher.spawn();

        for tag in ["p_consumed", "p_generated", "voltage_L1"] {
            input_tx
                .send(MeasurementRecord::new("dsmr", "el", tag, 1.0, 60))
                .await
                .unwrap();
        }
        drop(input_tx);

        let report = handle.await.unwrap();
        assert_eq!(report.records, 3);

        // topic keyed: every tag is its own bucket
        assert_eq!(topic_seen.lock().unwrap().len(), 3);
        // prefix keyed: all "dsmr" records share one bucket
        assert_eq!(prefix_seen.lock().unwrap().len(), 1);

        let influx = &report.sinks[1].1;
        assert_eq!(influx.forwarded_count, 1);
        assert_eq!(influx.suppressed_count, 2);
    }

    #[tokio::test]
    async fn test_cancel_dispatches_queued_records() {
        let (input_tx, input_rx) = async_channel::unbounded();
        let cancel = CancellationToken::new();
        let (sink, seen) = recording("log", ThrottleKey::Topic);

        for i in 0..5 {
            input_tx
                .send(MeasurementRecord::new("dsmr", "errors", format!("err{i}"), "x", 0))
                .await
                .unwrap();
        }
        cancel.cancel();

        let dispatcher = Dispatcher::with_handles(vec![sink], input_rx).with_cancellation(cancel);
        let report = dispatcher.run().await;

        assert_eq!(report.records, 5);
        assert_eq!(seen.lock().unwrap().len(), 5);
        // input sender still alive: cancellation alone stopped the loop
        drop(input_tx);
    }

    #[tokio::test]
    async fn test_create_dispatcher_from_blueprint() {
        let (input_tx, input_rx) = async_channel::unbounded();
        let dispatcher =
            create_dispatcher(&blueprint(), input_rx, CancellationToken::new(), false).unwrap();
        assert_eq!(dispatcher.metrics().len(), 1);
        let handle = dispatcher.spawn();

        input_tx
            .send(MeasurementRecord::new("solar", "system", "status_code", 512i64, 3600))
            .await
            .unwrap();
        drop(input_tx);

        let report = handle.await.unwrap();
        assert_eq!(report.sinks[0].0, "console");
        assert_eq!(report.sinks[0].1.forwarded_count, 1);
    }

    #[tokio::test]
    async fn test_dry_run_replaces_network_sinks() {
        let (input_tx, input_rx) = async_channel::unbounded();
        // default sinks: mqtt + influxdb, both become log sinks
        let bp = config_blueprint(vec![
            SinkConfig::new("mqtt", SinkType::Mqtt),
            SinkConfig::new("influxdb", SinkType::Influxdb),
        ]);
        let dispatcher = create_dispatcher(&bp, input_rx, CancellationToken::new(), true).unwrap();
        let handle = dispatcher.spawn();

        input_tx
            .send(MeasurementRecord::new("dsmr", "el", "p_consumed", 5.0, 60))
            .await
            .unwrap();
        drop(input_tx);

        let report = handle.await.unwrap();
        assert_eq!(report.sinks.len(), 2);
        assert!(report.sinks.iter().all(|(_, m)| m.forwarded_count == 1));
    }

    #[test]
    fn test_no_sinks_rejected() {
        let (_tx, rx) = async_channel::unbounded();
        let result = create_dispatcher(&config_blueprint(vec![]), rx, CancellationToken::new(), false);
        assert!(matches!(result, Err(DispatcherError::NoSinks)));
    }
}
