//! InfluxSink - one line-protocol point per record (InfluxDB 2.x)

use contracts::{ContractError, DataSink, InfluxConfig, MeasurementRecord, MeasurementValue};
use influxdb2::Client;
use tracing::{debug, info, instrument};

/// Fixed `location` tag on every point
pub const LOCATION_TAG: &str = "lt";

/// Sink that writes points to InfluxDB
///
/// Measurement `{prefix}_{topic}`, tag `location`, one field `{tag}=value`,
/// timestamp is the write time.
pub struct InfluxSink {
    name: String,
    client: Client,
    org: String,
    bucket: String,
}

impl InfluxSink {
    pub fn new(name: impl Into<String>, config: &InfluxConfig) -> Self {
        let name = name.into();
        debug!(
            sink = %name,
            url = %config.url,
            org = %config.org,
            bucket = %config.bucket_id,
            "Creating InfluxDB client"
        );

        Self {
            name,
            client: Client::new(&config.url, &config.org, &config.token),
            org: config.org.clone(),
            bucket: config.bucket_id.clone(),
        }
    }
}

/// Escape measurement names (commas and spaces)
fn escape_measurement(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, ',' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape tag keys, tag values and field keys
fn escape_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn field_value(value: &MeasurementValue) -> Result<String, String> {
    match value {
        MeasurementValue::Int(v) => Ok(format!("{v}i")),
        MeasurementValue::Float(v) if v.is_finite() => Ok(format!("{v}")),
        MeasurementValue::Float(v) => Err(format!("non-finite float {v}")),
        MeasurementValue::Text(v) => Ok(format!(
            "\"{}\"",
            v.replace('\\', "\\\\").replace('"', "\\\"")
        )),
    }
}

/// Render one record as a line-protocol point
///
/// # Errors
/// Non-finite floats cannot be represented.
pub fn to_line_protocol(
    record: &MeasurementRecord,
    sink_name: &str,
    timestamp_ns: i64,
) -> Result<String, ContractError> {
    let value = field_value(&record.value)
        .map_err(|message| ContractError::sink_write(sink_name, message))?;

    Ok(format!(
        "{}_{},location={} {}={} {}",
        escape_measurement(&record.source),
        escape_measurement(&record.topic),
        escape_key(LOCATION_TAG),
        escape_key(&record.tag),
        value,
        timestamp_ns
    ))
}

impl DataSink for InfluxSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, record: &MeasurementRecord) -> Result<(), ContractError> {
        let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let line = to_line_protocol(record, &self.name, now)?;
        debug!(sink = %self.name, line = %line, "Writing point");

        self.client
            .write_line_protocol(&self.org, &self.bucket, line)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, format!("write failed: {e}")))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // Every point is written synchronously
        Ok(())
    }

    #[instrument(name = "influx_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "InfluxSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: i64 = 1_700_000_000_000_000_000;

    #[test]
    fn test_float_point() {
        let record = MeasurementRecord::new("dsmr", "el", "p_consumed", 1193.5, 60);
        assert_eq!(
            to_line_protocol(&record, "influxdb", TS).unwrap(),
            "dsmr_el,location=lt p_consumed=1193.5 1700000000000000000"
        );
    }

    #[test]
    fn test_whole_float_stays_float() {
        // no `i` suffix, so InfluxDB stores a float
        let record = MeasurementRecord::new("solar", "metrics", "active_power", 2850.0, 3600);
        assert_eq!(
            to_line_protocol(&record, "influxdb", TS).unwrap(),
            "solar_metrics,location=lt active_power=2850 1700000000000000000"
        );
    }

    #[test]
    fn test_int_point() {
        let record = MeasurementRecord::new("solar", "system", "status_code", 512i64, 3600);
        let line = to_line_protocol(&record, "influxdb", TS).unwrap();
        assert!(line.contains("status_code=512i "));
    }

    #[test]
    fn test_string_point_escaped() {
        let record = MeasurementRecord::new(
            "solar",
            "system",
            "status_string",
            "On-grid \"ok\" \\ done",
            3600,
        );
        let line = to_line_protocol(&record, "influxdb", TS).unwrap();
        assert!(line.contains(r#"status_string="On-grid \"ok\" \\ done""#));
    }

    #[test]
    fn test_keys_escaped() {
        let record = MeasurementRecord::new("my src", "el,x", "a=b c", 1i64, 0);
        let line = to_line_protocol(&record, "influxdb", TS).unwrap();
        assert!(line.starts_with(r"my\ src_el\,x,location=lt a\=b\ c=1i "));
    }

    #[test]
    fn test_non_finite_rejected() {
        let record = MeasurementRecord::new("dsmr", "el", "p", f64::NAN, 0);
        let err = to_line_protocol(&record, "influxdb", TS).unwrap_err();
        assert!(matches!(err, ContractError::SinkWrite { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_write_error() {
        let config = InfluxConfig {
            url: "http://127.0.0.1:1".to_string(),
            token: "token".to_string(),
            bucket_id: "bucket".to_string(),
            org: "org".to_string(),
        };
        let mut sink = InfluxSink::new("influxdb", &config);
        let record = MeasurementRecord::new("dsmr", "el", "p_consumed", 1.0, 60);

        let result = sink.write(&record).await;
        assert!(matches!(result, Err(ContractError::SinkWrite { .. })));
        assert!(sink.close().await.is_ok());
    }
}
