//! DSMR P1 smart meter producer

use std::time::Duration;

use contracts::DsmrConfig;
use tokio::io::{AsyncBufRead, BufReader};
use tokio_serial::{DataBits, FlowControl, Parity, SerialStream, StopBits};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::reader::TelegramReader;
use super::telegram::{TelegramParser, DSMR_SOURCE};
use crate::error::{IngestionError, Result};
use crate::pipeline::RecordEmitter;
use crate::producer::MeasurementProducer;

/// P1 port reader
///
/// Opens the serial port (8N1, software flow control), frames telegrams,
/// and emits every parsed record in line order.
pub struct DsmrMeter {
    port: String,
    baud_rate: u32,
    read_timeout: Duration,
    parser: TelegramParser,
}

impl DsmrMeter {
    pub fn new(port: impl Into<String>, config: &DsmrConfig) -> Result<Self> {
        Ok(Self {
            port: port.into(),
            baud_rate: config.baud_rate,
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            parser: TelegramParser::new()?,
        })
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    fn open_serial(&self) -> Result<SerialStream> {
        let builder = tokio_serial::new(&self.port, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::Software)
            .timeout(self.read_timeout);

        SerialStream::open(&builder).map_err(|e| IngestionError::SerialOpen {
            port: self.port.clone(),
            message: e.to_string(),
        })
    }

    /// Parse one telegram and emit its records
    ///
    /// Returns the number of records emitted.
    pub fn process_telegram(&self, telegram: &str, emitter: &RecordEmitter) -> Result<usize> {
        let parsed = self.parser.parse_telegram(telegram);
        let metrics = emitter.metrics();
        metrics.record_telegram();

        for _ in 0..parsed.parse_errors {
            metrics.record_parse_error();
            observability::record_parse_error(DSMR_SOURCE);
        }
        for _ in 0..parsed.skipped {
            metrics.record_validation_skipped();
        }

        let count = parsed.records.len();
        for record in parsed.records {
            emitter.emit(record)?;
        }
        Ok(count)
    }

    /// Read telegrams from `reader` until cancelled
    ///
    /// # Errors
    /// `StreamClosed` when the stream ends, or any read/queue error.
    pub async fn consume<R>(
        &self,
        reader: R,
        emitter: &RecordEmitter,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut telegrams = TelegramReader::new(reader, self.read_timeout);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                next = telegrams.next_telegram() => next?,
            };

            match next {
                Some(telegram) => {
                    self.process_telegram(&telegram, emitter)?;
                }
                None => {
                    return Err(IngestionError::StreamClosed {
                        device: self.port.clone(),
                    })
                }
            }
        }
    }
}

impl MeasurementProducer for DsmrMeter {
    fn name(&self) -> &str {
        DSMR_SOURCE
    }

    #[instrument(name = "dsmr_meter", skip_all, fields(port = %self.port))]
    async fn run(&mut self, emitter: RecordEmitter, cancel: CancellationToken) -> Result<()> {
        info!(baud_rate = self.baud_rate, "starting P1 smart meter reader");
        let serial = self.open_serial()?;
        let result = self.consume(BufReader::new(serial), &emitter, &cancel).await;
        info!("P1 smart meter reader stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IngestionPipeline;

    const TELEGRAMS: &[u8] = b"/ISK5\\2M550E-1011\r\n\
1-0:1.7.0(01.193*kW)\r\n\
1-0:32.7.0(abc*V)\r\n\
!1234\r\n\
/ISK5\\2M550E-1011\r\n\
1-0:1.7.0(00.250*kW)\r\n\
!5678\r\n";

    fn meter() -> DsmrMeter {
        DsmrMeter::new("/dev/ttyUSB0", &DsmrConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_consume_emits_then_reports_stream_end() {
        let mut pipeline = IngestionPipeline::new();
        let rx = pipeline.take_receiver().unwrap();
        let emitter = pipeline.emitter();

        let result = meter()
            .consume(TELEGRAMS, &emitter, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(IngestionError::StreamClosed { .. })));

        let mut tags = Vec::new();
        while let Ok(record) = rx.try_recv() {
            tags.push(record.tag);
        }
        // provider, p_consumed, checksum per telegram; totals are zero and skipped
        assert_eq!(
            tags,
            vec!["provider", "p_consumed", "checksum", "provider", "p_consumed", "checksum"]
        );

        let snap = pipeline.metrics().snapshot();
        assert_eq!(snap.telegrams_received, 2);
        assert_eq!(snap.parse_errors, 1);
        assert_eq!(snap.validation_skipped, 4);
    }

    #[tokio::test]
    async fn test_cancel_stops_consume() {
        let pipeline = IngestionPipeline::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (reader, _writer) = tokio::io::duplex(64);
        let result = meter()
            .consume(BufReader::new(reader), &pipeline.emitter(), &cancel)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_open_failure_is_fatal() {
        let mut meter =
            DsmrMeter::new("/dev/does-not-exist-p1", &DsmrConfig::default()).unwrap();
        let pipeline = IngestionPipeline::new();
        let result = meter
            .run(pipeline.emitter(), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(IngestionError::SerialOpen { .. })));
    }
}
