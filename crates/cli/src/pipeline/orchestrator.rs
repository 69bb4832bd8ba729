//! Pipeline orchestrator - coordinates all components.
//!
//! Producers (DSMR meter, SUN2000 poller) feed one measurement queue; the
//! dispatcher broadcasts it to the sinks. A producer that fails stops the
//! whole logger.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::LoggerBlueprint;
use ingestion::{DsmrMeter, IngestionPipeline, ModbusRtuTransport, ProducerExit, Sun2000Poller};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The logger blueprint configuration
    pub blueprint: LoggerBlueprint,

    /// Replace every sink with a log sink
    pub dry_run: bool,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the pipeline when cancelled (Ctrl-C, SIGTERM)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled or until a producer fails
    ///
    /// Setup errors (metrics listener, inverter port, no sinks) are returned
    /// as `Err`. A producer failure after startup is reported in
    /// `PipelineStats::failure` so the caller can still print the summary.
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        if blueprint.enabled_devices().is_empty() {
            anyhow::bail!("No producers enabled - enable dsmr or sun2000");
        }

        // Setup Ingestion Pipeline
        let mut ingestion = IngestionPipeline::with_cancellation(self.cancel.clone());
        let queue_rx = ingestion
            .take_receiver()
            .context("Failed to get measurement queue receiver")?;

        // Setup Dispatcher; cancelled separately so it can drain after the producers stop
        let dispatcher_cancel = CancellationToken::new();
        let dispatcher = dispatcher::create_dispatcher(
            blueprint,
            queue_rx,
            dispatcher_cancel.clone(),
            self.config.dry_run,
        )
        .context("Failed to create dispatcher")?;

        // Open the inverter before anything is spawned
        let inverter = if blueprint.sun2000.enabled {
            let transport = ModbusRtuTransport::open(
                &blueprint.devices.sun2k_port,
                blueprint.sun2000.baud_rate,
                blueprint.sun2000.slave_id,
                Duration::from_millis(blueprint.sun2000.request_timeout_ms),
            )
            .with_context(|| {
                format!(
                    "Failed to open SUN2000 port {}",
                    blueprint.devices.sun2k_port
                )
            })?;
            Some(Sun2000Poller::new(transport, &blueprint.sun2000))
        } else {
            None
        };

        let sink_count = blueprint.sinks.len();
        let dispatcher_handle = dispatcher.spawn();
        info!(sinks = sink_count, dry_run = self.config.dry_run, "Dispatcher started");

        let mut producers = Vec::new();
        if blueprint.dsmr.enabled {
            let meter = DsmrMeter::new(blueprint.devices.dsmr_port.clone(), &blueprint.dsmr)
                .context("Failed to build DSMR meter")?;
            producers.push("dsmr".to_string());
            ingestion.spawn(meter);
        }
        if let Some(poller) = inverter {
            producers.push("sun2000".to_string());
            ingestion.spawn(poller);
        }

        info!(producers = ?producers, "Logger running");

        let failure = self.supervise(&mut ingestion).await;

        // Shutdown
        info!("Shutting down pipeline...");
        ingestion.shutdown().await;
        dispatcher_cancel.cancel();

        let dispatch = match dispatcher_handle.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Dispatcher task failed");
                Default::default()
            }
        };

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            producers,
            ingestion: ingestion.metrics().snapshot(),
            dispatch,
            failure,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            records = stats.ingestion.records_emitted,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    /// Wait for cancellation or the first failing producer
    async fn supervise(&self, ingestion: &mut IngestionPipeline) -> Option<String> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown requested");
                    return None;
                }
                exit = ingestion.next_exit() => match exit {
                    Some(ProducerExit { name, result: Err(e) }) => {
                        error!(producer = %name, error = %e, "Producer failed, stopping logger");
                        return Some(format!("{name}: {e}"));
                    }
                    Some(ProducerExit { name, result: Ok(()) }) => {
                        warn!(producer = %name, "Producer finished");
                    }
                    None => {
                        warn!("No producers left");
                        return None;
                    }
                },
            }
        }
    }
}
