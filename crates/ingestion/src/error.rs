//! Ingestion 错误类型

use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 报文行解析失败 (数值转换)
    #[error("failed to parse '{identifier}': {message}")]
    ParseFailed {
        /// OBIS 标识
        identifier: String,
        /// 错误消息
        message: String,
    },

    /// 字段表中的正则无效
    #[error("invalid extraction pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// 串口打开失败
    #[error("failed to open serial port {port}: {message}")]
    SerialOpen {
        /// 串口路径
        port: String,
        /// 错误消息
        message: String,
    },

    /// 寄存器读取失败
    #[error("register read at {address} failed: {message}")]
    Transport {
        /// 寄存器地址
        address: u16,
        /// 错误消息
        message: String,
    },

    /// 寄存器读取超时
    #[error("register read at {address} timed out after {timeout_ms}ms")]
    Timeout {
        /// 寄存器地址
        address: u16,
        /// 超时 (毫秒)
        timeout_ms: u64,
    },

    /// 数据流结束 (串口关闭)
    #[error("data stream of {device} ended")]
    StreamClosed {
        /// 设备名称
        device: String,
    },

    /// 测量队列已关闭
    #[error("measurement queue closed for {source_name}")]
    ChannelClosed {
        /// 数据来源
        source_name: String,
    },

    /// 生产者任务异常退出
    #[error("producer {producer} aborted: {message}")]
    TaskFailed {
        /// 生产者名称
        producer: String,
        /// 错误消息
        message: String,
    },

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
