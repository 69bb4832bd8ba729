//! LoggerBlueprint - Config Loader 输出
//!
//! 描述完整的采集器配置：MQTT、串口设备、InfluxDB、设备参数、输出路由。

use serde::{Deserialize, Serialize};

use crate::MeasurementRecord;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的采集器配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// MQTT broker 连接参数
    pub mqtt: MqttConfig,

    /// 串口设备路径
    pub devices: DevicesConfig,

    /// InfluxDB 连接参数
    pub influxdb: InfluxConfig,

    /// DSMR 智能电表参数
    #[serde(default)]
    pub dsmr: DsmrConfig,

    /// SUN2000 逆变器参数
    #[serde(default)]
    pub sun2000: Sun2000Config,

    /// 输出路由配置
    #[serde(default = "default_sinks")]
    pub sinks: Vec<SinkConfig>,
}

/// MQTT 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker 地址
    pub server: String,

    /// Broker 端口
    pub port: u16,

    /// 用户名
    pub user: String,

    /// 密码
    pub password: String,

    /// 客户端 ID
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

fn default_client_id() -> String {
    "solar_pi".to_string()
}

/// 串口设备配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// P1 智能电表串口 (e.g., "/dev/ttyUSB0")
    pub dsmr_port: String,

    /// SUN2000 逆变器 RS485 串口
    pub sun2k_port: String,
}

/// InfluxDB 2.x 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// 服务地址 (e.g., "http://localhost:8086")
    pub url: String,

    /// API token
    pub token: String,

    /// Bucket
    pub bucket_id: String,

    /// 组织
    pub org: String,
}

/// DSMR 串口参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsmrConfig {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 波特率
    #[serde(default = "default_dsmr_baud_rate")]
    pub baud_rate: u32,

    /// 单行读取超时 (秒)
    #[serde(default = "default_dsmr_read_timeout")]
    pub read_timeout_secs: u64,
}

impl Default for DsmrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            baud_rate: default_dsmr_baud_rate(),
            read_timeout_secs: default_dsmr_read_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_dsmr_baud_rate() -> u32 {
    115_200
}

fn default_dsmr_read_timeout() -> u64 {
    12
}

/// SUN2000 Modbus RTU 参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sun2000Config {
    /// 是否启用
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 波特率
    #[serde(default = "default_sun2000_baud_rate")]
    pub baud_rate: u32,

    /// 从站地址
    #[serde(default = "default_slave_id")]
    pub slave_id: u8,

    /// 单次请求超时 (毫秒)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// 单个寄存器读取的最大尝试次数
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// 重试间隔 (毫秒)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// 待机 (无光照) 时的冷却时间 (秒)
    #[serde(default = "default_standby_cooldown_secs")]
    pub standby_cooldown_secs: u64,

    /// 两次轮询之间的间隔 (毫秒, 0 = 连续轮询)
    #[serde(default)]
    pub poll_interval_ms: u64,
}

impl Default for Sun2000Config {
    fn default() -> Self {
        Self {
            enabled: true,
            baud_rate: default_sun2000_baud_rate(),
            slave_id: default_slave_id(),
            request_timeout_ms: default_request_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            standby_cooldown_secs: default_standby_cooldown_secs(),
            poll_interval_ms: 0,
        }
    }
}

fn default_sun2000_baud_rate() -> u32 {
    9600
}

fn default_slave_id() -> u8 {
    1
}

fn default_request_timeout_ms() -> u64 {
    200
}

fn default_retry_attempts() -> u32 {
    500
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_standby_cooldown_secs() -> u64 {
    10
}

/// Sink 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 限流分组方式 (缺省按 sink 类型决定)
    #[serde(default)]
    pub throttle_key: Option<ThrottleKey>,
}

impl SinkConfig {
    pub fn new(name: impl Into<String>, sink_type: SinkType) -> Self {
        Self {
            name: name.into(),
            sink_type,
            throttle_key: None,
        }
    }

    /// 实际生效的限流分组方式
    ///
    /// MQTT 按完整 topic 分组，InfluxDB 按来源前缀分组。
    pub fn effective_throttle_key(&self) -> ThrottleKey {
        self.throttle_key.unwrap_or(match self.sink_type {
            SinkType::Mqtt | SinkType::Log => ThrottleKey::Topic,
            SinkType::Influxdb => ThrottleKey::Prefix,
        })
    }
}

fn default_sinks() -> Vec<SinkConfig> {
    vec![
        SinkConfig::new("mqtt", SinkType::Mqtt),
        SinkConfig::new("influxdb", SinkType::Influxdb),
    ]
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// MQTT broker
    Mqtt,
    /// InfluxDB 2.x
    Influxdb,
    /// 日志输出
    Log,
}

/// 限流分组键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleKey {
    /// `{source}/{topic}/{tag}`，每个字段独立限流
    Topic,
    /// 仅 `{source}`，同一来源的所有字段共享一个限流桶
    Prefix,
}

impl ThrottleKey {
    /// 计算记录的分组键
    pub fn key_for(self, record: &MeasurementRecord) -> String {
        match self {
            Self::Topic => record.topic_path(),
            Self::Prefix => record.source.clone(),
        }
    }
}

impl LoggerBlueprint {
    /// Serial port paths of enabled producers
    pub fn enabled_devices(&self) -> Vec<(&'static str, &str)> {
        let mut devices = Vec::new();
        if self.dsmr.enabled {
            devices.push(("dsmr", self.devices.dsmr_port.as_str()));
        }
        if self.sun2000.enabled {
            devices.push(("sun2000", self.devices.sun2k_port.as_str()));
        }
        devices
    }
}
