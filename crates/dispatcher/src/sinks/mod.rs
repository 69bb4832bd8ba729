//! Sink implementations
//!
//! Contains MqttSink, InfluxSink, and LogSink.

mod influx;
mod log;
mod mqtt;

pub use self::influx::{to_line_protocol, InfluxSink, LOCATION_TAG};
pub use self::log::LogSink;
pub use self::mqtt::MqttSink;
