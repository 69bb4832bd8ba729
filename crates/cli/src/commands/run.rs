//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Load configuration; a template is written when the file is missing
    let mut blueprint = config_loader::ConfigLoader::load_or_create_template(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if args.no_dsmr {
        info!("DSMR meter disabled from CLI");
        blueprint.dsmr.enabled = false;
    }
    if args.no_sun2000 {
        info!("SUN2000 poller disabled from CLI");
        blueprint.sun2000.enabled = false;
    }

    info!(
        mqtt = %format!("{}:{}", blueprint.mqtt.server, blueprint.mqtt.port),
        influxdb = %blueprint.influxdb.url,
        devices = ?blueprint.enabled_devices(),
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - measurements are logged, not published");
    }

    // Build pipeline configuration
    let pipeline_config = PipelineConfig {
        blueprint,
        dry_run: args.dry_run,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let pipeline = Pipeline::new(pipeline_config);

    // Setup graceful shutdown handler
    let cancel = pipeline.cancellation_token();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping pipeline...");
        cancel.cancel();
    });

    info!("Starting pipeline...");
    let result = pipeline.run().await;
    signal_task.abort();

    let stats = result.context("Pipeline execution failed")?;
    stats.print_summary();

    if let Some(failure) = stats.failure {
        anyhow::bail!("Producer failed: {}", failure);
    }

    info!("Energy Logger finished");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires; the other one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
