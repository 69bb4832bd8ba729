//! Layered error definitions
//!
//! Categorized by source: config / device / sink

use thiserror::Error;

/// Placeholder written into generated config templates
pub const CONFIG_PLACEHOLDER: &str = "!CHANGEME";

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// A template value was never filled in
    #[error("please check the config file [{section}] section: '{key}' is still set to {CONFIG_PLACEHOLDER}")]
    ConfigPlaceholder { section: String, key: String },

    /// Config file absent (a template may have been written in its place)
    #[error("config file '{path}' does not exist")]
    ConfigMissing { path: String },

    // ===== Device Errors =====
    /// Device connection error (serial port, transport)
    #[error("device '{device}' connection error: {message}")]
    DeviceConnection { device: String, message: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create placeholder error
    pub fn config_placeholder(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ConfigPlaceholder {
            section: section.into(),
            key: key.into(),
        }
    }

    /// Create device connection error
    pub fn device_connection(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceConnection {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Create sink connection error
    pub fn sink_connection(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkConnection {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
