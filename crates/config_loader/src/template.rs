//! 配置模板
//!
//! 配置文件缺失时写出，所有必填项均为占位符。

use contracts::{ContractError, CONFIG_PLACEHOLDER};

use crate::ConfigFormat;

const TOML_TEMPLATE: &str = r#"[mqtt]
server = "{P}"
port = "{P}"
user = "{P}"
password = "{P}"
client_id = "solar_pi"

[devices]
dsmr_port = "{P}"
sun2k_port = "{P}"

[influxdb]
url = "{P}"
token = "{P}"
bucket_id = "{P}"
org = "{P}"

# Optional sections, shown with their defaults:
#
# [dsmr]
# enabled = true
# baud_rate = 115200
# read_timeout_secs = 12
#
# [sun2000]
# enabled = true
# baud_rate = 9600
# slave_id = 1
# request_timeout_ms = 200
# retry_attempts = 500
# retry_delay_ms = 100
# standby_cooldown_secs = 10
# poll_interval_ms = 0
#
# [[sinks]]
# name = "mqtt"
# sink_type = "mqtt"         # mqtt | influxdb | log
# throttle_key = "topic"     # topic | prefix
"#;

/// 按格式生成模板内容
pub fn render(format: ConfigFormat) -> Result<String, ContractError> {
    let toml_text = TOML_TEMPLATE.replace("{P}", CONFIG_PLACEHOLDER);
    match format {
        ConfigFormat::Toml => Ok(toml_text),
        ConfigFormat::Json => {
            let table: toml::Table = toml::from_str(&toml_text)
                .map_err(|e| ContractError::config_parse(format!("template error: {e}")))?;
            serde_json::to_string_pretty(&table)
                .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
        }
    }
}
