//! # Dispatcher
//!
//! 数据分发模块。
//!
//! 负责：
//! - 消费测量队列中的 `MeasurementRecord`
//! - 广播到每个 sink，各 sink 独立限流
//! - 隔离慢 sink，不阻塞主链路

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;
pub mod throttle;

pub use contracts::{DataSink, MeasurementRecord};
pub use dispatcher::{
    create_dispatcher, DispatchReport, Dispatcher, DispatcherBuilder, DispatcherConfig,
};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{to_line_protocol, InfluxSink, LogSink, MqttSink};
pub use throttle::{DispatchEntry, RateLimiter, ThrottleDecision};
