//! LogSink - logs forwarded records via tracing

use contracts::{ContractError, DataSink, MeasurementRecord};
use tracing::{info, instrument};

/// Sink that logs every forwarded record (debugging, `--dry-run`)
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    /// Records logged so far
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, record: &MeasurementRecord) -> Result<(), ContractError> {
        self.written += 1;
        info!(
            sink = %self.name,
            topic = %record.topic_path(),
            value = %record.value,
            data_type = %record.value.data_type(),
            "Measurement"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, written = self.written, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let record = MeasurementRecord::new("dsmr", "gas", "gas_consumed", 1234.0, 1);

        assert!(sink.write(&record).await.is_ok());
        assert!(sink.write(&record).await.is_ok());
        assert_eq!(sink.written(), 2);
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
