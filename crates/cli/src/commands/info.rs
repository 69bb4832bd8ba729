//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::LoggerBlueprint;
use ingestion::dsmr::DSMR5_FIELDS;
use ingestion::sun2000::{register_map, RegisterFormat, SUN2000_RATE};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<LoggerInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    registers: Vec<RegisterInfo>,
}

#[derive(Serialize)]
struct LoggerInfo {
    version: String,
    mqtt: MqttInfo,
    influxdb: InfluxInfo,
    devices: Vec<DeviceInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct MqttInfo {
    server: String,
    port: u16,
    client_id: String,
}

#[derive(Serialize)]
struct InfluxInfo {
    url: String,
    org: String,
    bucket: String,
}

#[derive(Serialize)]
struct DeviceInfo {
    name: String,
    port: String,
    enabled: bool,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    throttle_key: String,
}

#[derive(Serialize)]
struct FieldInfo {
    identifier: String,
    description: String,
    topic: String,
    tag: String,
    data_type: String,
    multiplier: u32,
    max_rate_per_hour: u32,
}

#[derive(Serialize)]
struct RegisterInfo {
    name: String,
    address: u16,
    count: u16,
    format: String,
    signed: bool,
    decimals: u32,
}

/// Execute the `info` command
///
/// `--fields` and `--registers` work without a configuration file.
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = if args.config.exists() {
        Some(
            config_loader::ConfigLoader::load_from_path(&args.config).with_context(|| {
                format!("Failed to load config from {}", args.config.display())
            })?,
        )
    } else if args.fields || args.registers {
        None
    } else {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    };

    if args.json {
        let info = build_config_info(blueprint.as_ref(), args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        if let Some(ref blueprint) = blueprint {
            print_config_info(blueprint, args);
        }
        if args.fields {
            print_fields();
        }
        if args.registers {
            print_registers();
        }
    }

    Ok(())
}

fn build_config_info(blueprint: Option<&LoggerBlueprint>, args: &InfoArgs) -> ConfigInfo {
    let config = blueprint.map(|bp| LoggerInfo {
        version: format!("{:?}", bp.version),
        mqtt: MqttInfo {
            server: bp.mqtt.server.clone(),
            port: bp.mqtt.port,
            client_id: bp.mqtt.client_id.clone(),
        },
        influxdb: InfluxInfo {
            url: bp.influxdb.url.clone(),
            org: bp.influxdb.org.clone(),
            bucket: bp.influxdb.bucket_id.clone(),
        },
        devices: vec![
            DeviceInfo {
                name: "dsmr".to_string(),
                port: bp.devices.dsmr_port.clone(),
                enabled: bp.dsmr.enabled,
            },
            DeviceInfo {
                name: "sun2000".to_string(),
                port: bp.devices.sun2k_port.clone(),
                enabled: bp.sun2000.enabled,
            },
        ],
        sinks: if args.sinks {
            bp.sinks
                .iter()
                .map(|s| SinkInfo {
                    name: s.name.clone(),
                    sink_type: format!("{:?}", s.sink_type),
                    throttle_key: format!("{:?}", s.effective_throttle_key()),
                })
                .collect()
        } else {
            Vec::new()
        },
    });

    let fields = if args.fields {
        DSMR5_FIELDS
            .iter()
            .map(|f| FieldInfo {
                identifier: f.identifier.to_string(),
                description: f.description.to_string(),
                topic: f.topic.to_string(),
                tag: f.tag.to_string(),
                data_type: f.data_type.to_string(),
                multiplier: f.multiplier,
                max_rate_per_hour: f.max_rate_per_hour,
            })
            .collect()
    } else {
        Vec::new()
    };

    let registers = if args.registers {
        register_map()
            .into_iter()
            .map(|r| RegisterInfo {
                name: r.name.to_string(),
                address: r.address,
                count: r.count,
                format: format_name(r.format).to_string(),
                signed: r.is_signed(),
                decimals: r.decimals,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        config,
        fields,
        registers,
    }
}

fn format_name(format: RegisterFormat) -> &'static str {
    match format {
        RegisterFormat::Text => "text",
        RegisterFormat::U16 => "u16",
        RegisterFormat::I16 => "i16",
        RegisterFormat::I32 => "i32",
    }
}

fn print_config_info(blueprint: &LoggerBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Energy Logger Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 MQTT");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!(
        "   ├─ Broker: {}:{}",
        blueprint.mqtt.server, blueprint.mqtt.port
    );
    println!("   └─ Client ID: {}", blueprint.mqtt.client_id);

    println!("\n🗄️  InfluxDB");
    println!("   ├─ URL: {}", blueprint.influxdb.url);
    println!("   ├─ Org: {}", blueprint.influxdb.org);
    println!("   └─ Bucket: {}", blueprint.influxdb.bucket_id);

    let on_off = |enabled: bool| if enabled { "enabled" } else { "disabled" };
    println!("\n🔌 Devices");
    println!(
        "   ├─ DSMR meter: {} @ {} baud ({})",
        blueprint.devices.dsmr_port,
        blueprint.dsmr.baud_rate,
        on_off(blueprint.dsmr.enabled)
    );
    println!(
        "   └─ SUN2000: {} @ {} baud, slave {} ({})",
        blueprint.devices.sun2k_port,
        blueprint.sun2000.baud_rate,
        blueprint.sun2000.slave_id,
        on_off(blueprint.sun2000.enabled)
    );

    if !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let is_last = i == blueprint.sinks.len() - 1;
            let prefix = if is_last { "└─" } else { "├─" };
            if args.sinks {
                println!(
                    "   {} {} ({:?}, throttle by {:?})",
                    prefix,
                    sink.name,
                    sink.sink_type,
                    sink.effective_throttle_key()
                );
            } else {
                println!("   {} {} ({:?})", prefix, sink.name, sink.sink_type);
            }
        }
    }

    println!();
}

fn print_fields() {
    println!("📋 DSMR Fields ({})", DSMR5_FIELDS.len());
    println!(
        "   {:<14} {:<28} {:<7} {:>6} {:>6}",
        "OBIS", "topic/tag", "type", "mult", "rate/h"
    );
    for f in DSMR5_FIELDS {
        println!(
            "   {:<14} {:<28} {:<7} {:>6} {:>6}",
            f.identifier,
            format!("{}/{}", f.topic, f.tag),
            f.data_type.to_string(),
            f.multiplier,
            f.max_rate_per_hour
        );
    }
    println!();
}

fn print_registers() {
    let map = register_map();
    println!(
        "🔆 SUN2000 Registers ({}, {} records/h per tag)",
        map.len(),
        SUN2000_RATE
    );
    println!(
        "   {:<20} {:>7} {:>5} {:<6} {:>8}",
        "name", "address", "count", "format", "decimals"
    );
    for r in map {
        println!(
            "   {:<20} {:>7} {:>5} {:<6} {:>8}",
            r.name,
            r.address,
            r.count,
            format_name(r.format),
            r.decimals
        );
    }
    println!();
}
