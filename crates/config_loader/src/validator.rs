//! 配置校验模块
//!
//! 校验规则：
//! - MQTT / InfluxDB 必填字段非空
//! - 端口 > 0
//! - sink 名称非空且唯一
//! - 至少启用一个采集设备
//! - SUN2000 重试次数 >= 1，从站地址在 1..=247
//! - 读取超时 > 0

use std::collections::HashSet;

use contracts::{ContractError, LoggerBlueprint, ThrottleKey};

/// 校验 LoggerBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    validate_mqtt(blueprint)?;
    validate_influxdb(blueprint)?;
    validate_devices(blueprint)?;
    validate_sun2000(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

/// 收集非致命的配置问题
pub fn warnings(blueprint: &LoggerBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - measurements will be dropped".to_string());
    }

    for sink in &blueprint.sinks {
        if sink.effective_throttle_key() == ThrottleKey::Prefix {
            warnings.push(format!(
                "Sink '{}' throttles by source prefix - all fields of a source share one rate budget",
                sink.name
            ));
        }
    }

    if !blueprint.dsmr.enabled {
        warnings.push("DSMR meter is disabled".to_string());
    }
    if !blueprint.sun2000.enabled {
        warnings.push("SUN2000 inverter is disabled".to_string());
    }

    warnings
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ContractError> {
    if value.trim().is_empty() {
        return Err(ContractError::config_validation(field, "cannot be empty"));
    }
    Ok(())
}

/// 校验 MQTT 配置
fn validate_mqtt(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    let mqtt = &blueprint.mqtt;
    require_non_empty("mqtt.server", &mqtt.server)?;
    require_non_empty("mqtt.client_id", &mqtt.client_id)?;
    if mqtt.port == 0 {
        return Err(ContractError::config_validation(
            "mqtt.port",
            "port must be > 0",
        ));
    }
    Ok(())
}

/// 校验 InfluxDB 配置
fn validate_influxdb(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    let influx = &blueprint.influxdb;
    require_non_empty("influxdb.url", &influx.url)?;
    require_non_empty("influxdb.org", &influx.org)?;
    require_non_empty("influxdb.bucket_id", &influx.bucket_id)?;
    Ok(())
}

/// 校验设备配置
fn validate_devices(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    if !blueprint.dsmr.enabled && !blueprint.sun2000.enabled {
        return Err(ContractError::config_validation(
            "dsmr.enabled / sun2000.enabled",
            "at least one producer must be enabled",
        ));
    }
    if blueprint.dsmr.enabled {
        require_non_empty("devices.dsmr_port", &blueprint.devices.dsmr_port)?;
        if blueprint.dsmr.baud_rate == 0 {
            return Err(ContractError::config_validation(
                "dsmr.baud_rate",
                "baud_rate must be > 0",
            ));
        }
        if blueprint.dsmr.read_timeout_secs == 0 {
            return Err(ContractError::config_validation(
                "dsmr.read_timeout_secs",
                "read_timeout_secs must be > 0",
            ));
        }
    }
    if blueprint.sun2000.enabled {
        require_non_empty("devices.sun2k_port", &blueprint.devices.sun2k_port)?;
    }
    Ok(())
}

/// 校验 SUN2000 参数
fn validate_sun2000(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    let sun = &blueprint.sun2000;
    if !sun.enabled {
        return Ok(());
    }
    if sun.retry_attempts == 0 {
        return Err(ContractError::config_validation(
            "sun2000.retry_attempts",
            "retry_attempts must be >= 1",
        ));
    }
    if !(1..=247).contains(&sun.slave_id) {
        return Err(ContractError::config_validation(
            "sun2000.slave_id",
            format!("slave_id must be in 1..=247, got {}", sun.slave_id),
        ));
    }
    if sun.baud_rate == 0 {
        return Err(ContractError::config_validation(
            "sun2000.baud_rate",
            "baud_rate must be > 0",
        ));
    }
    if sun.request_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "sun2000.request_timeout_ms",
            "request_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验 sink 配置
fn validate_sinks(blueprint: &LoggerBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
    }
    Ok(())
}
