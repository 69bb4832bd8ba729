//! DSMR 5.0 字段表
//!
//! OBIS 标识 → 字段定义。未知标识回落到 `errors/err`，不会被静默丢弃。

use std::collections::HashMap;

use contracts::DataType;
use regex::Regex;

use crate::error::Result;

/// 校验和行 (`!XXXX`) 的虚拟标识
pub const CHECKSUM_ID: &str = "999-999:0.0";

/// 厂商头行 (`/XXX5...`) 的虚拟标识
pub const PROVIDER_ID: &str = "999-999:0.1";

/// 合成的总用电量标识 (费率 1 + 费率 2)
pub const TOTAL_CONSUMED_ID: &str = "1-0:1.8.3";

/// 合成的总回馈电量标识 (费率 1 + 费率 2)
pub const TOTAL_RETURNED_ID: &str = "1-0:2.8.3";

/// 字段定义 (只读)
#[derive(Debug)]
pub struct FieldDefinition {
    /// OBIS 标识
    pub identifier: &'static str,
    /// 描述，单位写在 [] 中
    pub description: &'static str,
    /// 输出 topic
    pub topic: &'static str,
    /// 输出 tag，同一 topic 内唯一
    pub tag: &'static str,
    /// 提取正则，捕获组 1 为原始值
    pub pattern: &'static str,
    /// 数据类型
    pub data_type: DataType,
    /// 为零或为空时丢弃
    pub validate_non_zero: bool,
    /// 数值缩放倍数 (kW → W 为 1000)
    pub multiplier: u32,
    /// 每小时最多转发次数 (0 = 不限流)
    pub max_rate_per_hour: u32,
}

macro_rules! field {
    ($id:expr, $desc:expr, $topic:expr, $tag:expr, $pattern:expr, $dt:ident, $validate:expr, $mul:expr, $rate:expr) => {
        FieldDefinition {
            identifier: $id,
            description: $desc,
            topic: $topic,
            tag: $tag,
            pattern: $pattern,
            data_type: DataType::$dt,
            validate_non_zero: $validate,
            multiplier: $mul,
            max_rate_per_hour: $rate,
        }
    };
}

const ANY: &str = r"^.*\((.*)\)";
const KW: &str = r"^.*\((.*)\*kW\)";
const KWH: &str = r"^.*\((.*)\*kWh\)";
const VOLT: &str = r"^.*\((.*)\*V\)";
const AMP: &str = r"^.*\((.*)\*A\)";
const M3: &str = r"^.*\((.*)\*m3\)";
const WHOLE: &str = r"^(.*)$";

/// DSMR 5.0 字段表
pub static DSMR5_FIELDS: &[FieldDefinition] = &[
    // System messages
    field!("1-3:0.2.8", "DSMR Version meter", "system", "dsmr_version", ANY, String, false, 1, 0),
    field!("0-0:96.1.1", "Equipment identifier", "el", "serial", ANY, String, true, 1, 1),
    field!("0-1:96.1.1", "Equipment identifier", "gas", "serial", ANY, String, true, 1, 1),
    field!("0-0:96.1.4", "Version information", "system", "system_version", ANY, String, false, 1, 0),
    field!("0-0:96.13.0", "Text message (future use)", "system", "text_mesage", ANY, String, false, 1, 0),
    field!("1-0:31.4.0", "Fuse supervision treshold", "el", "fuse_treshold", AMP, String, false, 1, 0),
    field!("0-0:17.0.0", "Limiter treshold", "el", "limiter_treshold", KW, String, false, 1, 0),
    field!("0-0:96.3.10", "Breaker state", "el", "breaker_state", ANY, Int, false, 1, 12),
    field!("0-1:24.1.0", "Device type", "el", "device_type", ANY, Int, false, 1, 0),
    // Summer (S) and winter (W) time flags are both accepted
    field!("0-0:1.0.0", "Timestamp [s]", "el", "timestamp", r"^.*\((.*)[SW]\)", Int, true, 1, 0),
    field!("0-0:96.7.21", "Power failures amount", "el", "power_failures", ANY, Int, false, 1, 60),
    field!("0-0:96.7.9", "Long power failures amount", "el", "long_power_failures", ANY, Int, false, 1, 60),
    field!("0-0:96.14.0", "Tariff indicator electricity", "el", "tariff_indicator", ANY, Int, false, 1, 0),
    field!("1-0:21.7.0", "Power usage L1 [W]", "el", "P1_consumed", KW, Float, false, 1000, 60),
    field!("1-0:41.7.0", "Power usage L2 [W]", "el", "P2_consumed", KW, Float, false, 1000, 60),
    field!("1-0:61.7.0", "Power usage L3 [W]", "el", "P3_consumed", KW, Float, false, 1000, 60),
    field!("1-0:22.7.0", "Power generation L1 [W]", "el", "P1_generated", KW, Float, false, 1000, 60),
    field!("1-0:42.7.0", "Power generation L2 [W]", "el", "P2_generated", KW, Float, false, 1000, 60),
    field!("1-0:62.7.0", "Power generation L3 [W]", "el", "P3_generated", KW, Float, false, 1000, 60),
    field!("1-0:1.7.0", "Total power usage [W]", "el", "p_consumed", KW, Float, false, 1000, 60),
    field!("1-0:2.7.0", "Total power generation [W]", "el", "p_generated", KW, Float, false, 1000, 60),
    // 0-1:24.2.1 is used in the Netherlands, 0-1:24.2.3 in Belgium
    field!("0-1:24.2.1", "Gas consumption [m\u{b3}]", "gas", "gas_consumed", M3, Float, true, 1000, 12),
    field!("0-1:24.2.3", "Gas consumption [m\u{b3}]", "gas", "gas_consumed", M3, Float, true, 1000, 12),
    field!("0-1:96.1.0", "Equipment Identifier", "gas", "serial", r"^.*\(\d{26}(.*)\)", String, true, 1, 1),
    field!("1-0:1.8.1", "EL consumed (Tariff 1)[Wh]", "el", "el_consumed1", KWH, Float, true, 1000, 12),
    field!("1-0:1.8.2", "EL consumed (Tariff 2)[Wh]", "el", "el_consumed2", KWH, Float, true, 1000, 12),
    field!("1-0:2.8.1", "EL returned (Tariff 1)[Wh]", "el", "el_returned1", KWH, Float, true, 1000, 12),
    field!("1-0:2.8.2", "EL returned (Tariff 2)[Wh]", "el", "el_returned2", KWH, Float, true, 1000, 12),
    // Synthesized by preprocessing, not present in real telegrams
    field!(TOTAL_CONSUMED_ID, "EL consumed (total)[Wh]", "el", "el_consumed", KWH, Float, true, 1000, 12),
    field!(TOTAL_RETURNED_ID, "EL returned (total)[Wh]", "el", "el_returned", KWH, Float, true, 1000, 12),
    field!("1-0:32.7.0", "Voltage L1 [V]", "el", "voltage_L1", VOLT, Float, false, 1, 900),
    field!("1-0:52.7.0", "Voltage L2 [V]", "el", "voltage_L2", VOLT, Float, false, 1, 900),
    field!("1-0:72.7.0", "Voltage L3 [V]", "el", "voltage_L3", VOLT, Float, false, 1, 900),
    field!("1-0:31.7.0", "Current L1 [A]", "el", "current_L1", AMP, Float, false, 1, 900),
    field!("1-0:51.7.0", "Current L2 [A]", "el", "current_L2", AMP, Float, false, 1, 900),
    field!("1-0:71.7.0", "Current L3 [A]", "el", "current_L3", AMP, Float, false, 1, 900),
    field!("1-0:32.36.0", "Voltage swells L1", "el", "L1_swells", ANY, Float, false, 1, 12),
    field!("1-0:52.36.0", "Voltage swells L2", "el", "L2_swells", ANY, Float, false, 1, 12),
    field!("1-0:72.36.0", "Voltage swells L3", "el", "L3_swells", ANY, Float, false, 1, 12),
    field!("1-0:32.32.0", "Voltage sags L1", "el", "L1_sags", ANY, Float, false, 1, 12),
    field!("1-0:52.32.0", "Voltage sags L2", "el", "L2_sags", ANY, Float, false, 1, 12),
    field!("1-0:72.32.0", "Voltage sags L3", "el", "L3_sags", ANY, Float, false, 1, 12),
    field!("1-0:1.4.0", "Positive active demand in a current demand period", "el", "pos_act_demand", KW, Float, false, 1, 12),
    field!("0-0:98.1.0", "Maximum demand - Active energy import of the last 13 months", "el", "max_demand_13months", KW, Float, false, 1, 1),
    field!("1-0:1.6.0", "Positive active maximum demand (A+) total", "el", "pos_max_demand", KW, Float, false, 1, 60),
    field!("0-1:24.4.0", "Valve state", "gas", "valve_state", ANY, Int, false, 1, 60),
    // Virtual identifiers for frame lines
    field!(CHECKSUM_ID, "Checksum", "system", "checksum", WHOLE, String, false, 1, 0),
    field!(PROVIDER_ID, "Equipment provider", "system", "provider", WHOLE, String, false, 1, 0),
    field!("999-999:1.0", "Empty line", "system", "empty_line", ANY, String, false, 1, 0),
];

/// 未知标识的回落定义
pub static UNKNOWN_FIELD: FieldDefinition = field!(
    "",
    "Invalid or unknown DSMR telegram",
    "errors",
    "err",
    "",
    String,
    false,
    0,
    0
);

/// 已编译的字段
#[derive(Debug)]
pub struct CatalogEntry {
    pub definition: &'static FieldDefinition,
    pattern: Option<Regex>,
}

impl CatalogEntry {
    /// 提取原始值 (捕获组 1)，不匹配时为空串
    pub fn extract<'a>(&self, payload: &'a str) -> &'a str {
        match &self.pattern {
            Some(re) => re
                .captures(payload)
                .and_then(|c| c.get(1))
                .map_or("", |m| m.as_str()),
            None => payload,
        }
    }

    /// 是否为未知标识的回落项
    pub fn is_unknown(&self) -> bool {
        self.pattern.is_none()
    }
}

/// 字段表
#[derive(Debug)]
pub struct FieldCatalog {
    entries: HashMap<&'static str, CatalogEntry>,
    unknown: CatalogEntry,
}

impl FieldCatalog {
    /// 编译 DSMR 5.0 字段表
    pub fn dsmr5() -> Result<Self> {
        Self::from_definitions(DSMR5_FIELDS)
    }

    /// 从定义列表编译字段表
    pub fn from_definitions(definitions: &'static [FieldDefinition]) -> Result<Self> {
        let mut entries = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            let pattern = Regex::new(definition.pattern)?;
            entries.insert(
                definition.identifier,
                CatalogEntry {
                    definition,
                    pattern: Some(pattern),
                },
            );
        }

        Ok(Self {
            entries,
            unknown: CatalogEntry {
                definition: &UNKNOWN_FIELD,
                pattern: None,
            },
        })
    }

    /// 查找字段，未知标识返回回落项
    pub fn lookup(&self, identifier: &str) -> &CatalogEntry {
        self.entries.get(identifier).unwrap_or(&self.unknown)
    }

    /// 已知字段数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
