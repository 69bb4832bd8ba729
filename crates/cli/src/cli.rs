//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Energy Logger - DSMR smart meter and SUN2000 inverter to MQTT/InfluxDB
#[derive(Parser, Debug)]
#[command(
    name = "energy-logger",
    author,
    version,
    about = "Smart meter and solar inverter energy logger",
    long_about = "Reads DSMR P1 telegrams from a smart meter and polls a Huawei SUN2000 \n\
                  inverter over Modbus RTU, then forwards rate-limited measurements \n\
                  to an MQTT broker and an InfluxDB bucket."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ENERGY_LOGGER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "ENERGY_LOGGER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log level when RUST_LOG is unset
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the logger until Ctrl-C
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration, field catalog or register map
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); a template is written if missing
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "ENERGY_LOGGER_CONFIG"
    )]
    pub config: PathBuf,

    /// Log measurements instead of publishing them
    #[arg(long)]
    pub dry_run: bool,

    /// Do not start the DSMR smart meter reader
    #[arg(long)]
    pub no_dsmr: bool,

    /// Do not start the SUN2000 inverter poller
    #[arg(long)]
    pub no_sun2000: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "ENERGY_LOGGER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "ENERGY_LOGGER_CONFIG"
    )]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "ENERGY_LOGGER_CONFIG"
    )]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the DSMR field catalog
    #[arg(long)]
    pub fields: bool,

    /// Show the SUN2000 register map
    #[arg(long)]
    pub registers: bool,

    /// Show sink routing details
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
