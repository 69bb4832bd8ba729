//! MeasurementRecord - producer output, sink input
//!
//! Normalized readings from every device end up as one of these.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared datatype of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Int,
    Float,
    String,
}

impl DataType {
    /// Whether values of this type are scaled by a multiplier
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// Scalar measurement value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl MeasurementValue {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Text(_) => DataType::String,
        }
    }

    /// Empty text or numeric zero
    pub fn is_empty_or_zero(&self) -> bool {
        match self {
            Self::Int(v) => *v == 0,
            Self::Float(v) => *v == 0.0,
            Self::Text(v) => v.is_empty(),
        }
    }
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // Keep a trailing ".0" on whole floats so subscribers can tell them from ints
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for MeasurementValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MeasurementValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for MeasurementValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for MeasurementValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Normalized measurement record
///
/// Immutable once placed on the measurement queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Source prefix ("dsmr", "solar")
    pub source: String,

    /// Output topic ("el", "gas", "system", "metrics", "errors")
    pub topic: String,

    /// Output tag, unique per topic
    pub tag: String,

    /// Scalar value
    pub value: MeasurementValue,

    /// Maximum forwards per hour per dispatch key (0 = unthrottled)
    pub max_rate_per_hour: u32,
}

impl MeasurementRecord {
    pub fn new(
        source: impl Into<String>,
        topic: impl Into<String>,
        tag: impl Into<String>,
        value: impl Into<MeasurementValue>,
        max_rate_per_hour: u32,
    ) -> Self {
        Self {
            source: source.into(),
            topic: topic.into(),
            tag: tag.into(),
            value: value.into(),
            max_rate_per_hour,
        }
    }

    /// Full topic path `{source}/{topic}/{tag}`
    pub fn topic_path(&self) -> String {
        format!("{}/{}/{}", self.source, self.topic, self.tag)
    }

    /// Minimum seconds between two forwards of the same key
    ///
    /// `None` when the record is unthrottled.
    pub fn min_interval_secs(&self) -> Option<i64> {
        if self.max_rate_per_hour == 0 {
            None
        } else {
            Some(i64::from(3600 / self.max_rate_per_hour))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_path() {
        let record = MeasurementRecord::new("dsmr", "el", "p_consumed", 512.0, 60);
        assert_eq!(record.topic_path(), "dsmr/el/p_consumed");
    }

    #[test]
    fn test_min_interval() {
        let mut record = MeasurementRecord::new("dsmr", "el", "voltage_L1", 231.0, 60);
        assert_eq!(record.min_interval_secs(), Some(60));

        record.max_rate_per_hour = 900;
        assert_eq!(record.min_interval_secs(), Some(4));

        // floor(3600 / 7) = 514
        record.max_rate_per_hour = 7;
        assert_eq!(record.min_interval_secs(), Some(514));

        record.max_rate_per_hour = 0;
        assert_eq!(record.min_interval_secs(), None);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(MeasurementValue::Int(42).to_string(), "42");
        assert_eq!(MeasurementValue::Float(1234.0).to_string(), "1234.0");
        assert_eq!(MeasurementValue::Float(0.25).to_string(), "0.25");
        assert_eq!(MeasurementValue::from("On-grid").to_string(), "On-grid");
    }

    #[test]
    fn test_empty_or_zero() {
        assert!(MeasurementValue::Int(0).is_empty_or_zero());
        assert!(MeasurementValue::Float(0.0).is_empty_or_zero());
        assert!(MeasurementValue::from("").is_empty_or_zero());
        assert!(!MeasurementValue::Float(0.001).is_empty_or_zero());
        assert!(!MeasurementValue::from("E0043").is_empty_or_zero());
    }

    #[test]
    fn test_record_json_shape() {
        let record = MeasurementRecord::new("solar", "system", "status_code", 512i64, 3600);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["value"], 512);
        assert_eq!(json["max_rate_per_hour"], 3600);
    }
}
