//! SUN2000 inverter poller

use std::time::Duration;

use contracts::{MeasurementRecord, MeasurementValue, Sun2000Config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::registers::{
    pv_current, pv_voltage, RegisterSpec, DEVICE_STATUS, INTERNAL_TEMP, MAX_PV_STRINGS, METRICS,
    MODEL, MODEL_ID, PV_STRING_COUNT,
};
use super::status::{status_description, STANDBY_NO_IRRADIATION};
use super::transport::RegisterTransport;
use crate::error::Result;
use crate::pipeline::RecordEmitter;
use crate::producer::MeasurementProducer;
use crate::retry::RetryPolicy;

/// Source prefix of inverter records
pub const SUN2000_SOURCE: &str = "solar";

/// Forwards per hour for every inverter record
pub const SUN2000_RATE: u32 = 3600;

const SYSTEM_TOPIC: &str = "system";
const METRICS_TOPIC: &str = "metrics";

/// Identification read once at startup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub model_id: Option<u16>,
    pub pv_string_count: u16,
}

/// Result of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No irradiation, electrical metrics were not read
    Standby,
    /// Electrical metrics read and emitted
    Measured { records: usize },
}

/// Register poller for one inverter
///
/// 每个寄存器读取都经过 `RetryPolicy`；读取耗尽重试后按 0.0 发出。
pub struct Sun2000Poller<T> {
    transport: T,
    retry: RetryPolicy,
    standby_cooldown: Duration,
    poll_interval: Duration,
    device: Option<DeviceInfo>,
    last_status: Option<u16>,
    last_temperature: Option<f64>,
}

impl<T: RegisterTransport> Sun2000Poller<T> {
    pub fn new(transport: T, config: &Sun2000Config) -> Self {
        Self {
            transport,
            retry: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.retry_delay_ms),
            ),
            standby_cooldown: Duration::from_secs(config.standby_cooldown_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            device: None,
            last_status: None,
            last_temperature: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Identification, `None` before `identify`
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn read_registers(&mut self, spec: RegisterSpec, emitter: &RecordEmitter) -> Option<Vec<u16>> {
        let RegisterSpec { address, count, .. } = spec;
        let outcome = self
            .retry
            .call(spec.name, &mut self.transport, move |t| {
                Box::pin(t.read_holding_registers(address, count))
            })
            .await;

        if outcome.is_exhausted() {
            emitter.metrics().record_failed_read();
        }
        outcome.value
    }

    async fn read_number(&mut self, spec: RegisterSpec, emitter: &RecordEmitter) -> Option<f64> {
        let registers = self.read_registers(spec, emitter).await?;
        let value = spec.decode_number(&registers);
        if value.is_none() {
            warn!(register = spec.name, address = spec.address, "short register response");
        }
        value
    }

    async fn read_code(&mut self, spec: RegisterSpec, emitter: &RecordEmitter) -> Option<u16> {
        self.read_registers(spec, emitter)
            .await
            .and_then(|r| r.first().copied())
    }

    /// Read model and PV string count
    ///
    /// A failed or implausible PV string count means no strings are polled.
    pub async fn identify(&mut self, emitter: &RecordEmitter) -> DeviceInfo {
        let model_id = self.read_code(MODEL_ID, emitter).await;
        let model = self
            .read_registers(MODEL, emitter)
            .await
            .map(|r| MODEL.decode_text(&r));
        let pv_string_count = match self.read_code(PV_STRING_COUNT, emitter).await {
            Some(count) if count <= MAX_PV_STRINGS => count,
            Some(count) => {
                warn!(
                    count,
                    max = MAX_PV_STRINGS,
                    "implausible PV string count, string metrics disabled"
                );
                0
            }
            None => {
                warn!("PV string count unavailable, string metrics disabled");
                0
            }
        };

        info!(
            model = model.as_deref().unwrap_or("unknown"),
            model_id = ?model_id,
            pv_string_count,
            "inverter identified"
        );

        let device = DeviceInfo {
            model,
            model_id,
            pv_string_count,
        };
        self.device = Some(device.clone());
        device
    }

    fn emit(
        &self,
        emitter: &RecordEmitter,
        topic: &str,
        tag: impl Into<String>,
        value: impl Into<MeasurementValue>,
    ) -> Result<()> {
        emitter.emit(MeasurementRecord::new(
            SUN2000_SOURCE,
            topic,
            tag,
            value,
            SUN2000_RATE,
        ))
    }

    /// One poll cycle
    ///
    /// Status and temperature are emitted only when they change. In standby
    /// (no irradiation) the electrical metrics are skipped.
    pub async fn poll_cycle(&mut self, emitter: &RecordEmitter) -> Result<CycleOutcome> {
        let status = self.read_code(DEVICE_STATUS, emitter).await;
        let temperature = self.read_number(INTERNAL_TEMP, emitter).await;

        if let Some(code) = status {
            if self.last_status != Some(code) {
                let description = status_description(code);
                info!(status_code = code, status = description, "inverter status changed");
                self.last_status = Some(code);
                self.emit(emitter, SYSTEM_TOPIC, "status_code", i64::from(code))?;
                self.emit(emitter, SYSTEM_TOPIC, "status_string", description)?;
                observability::record_device_status(SUN2000_SOURCE, code);
            }
        }

        if let Some(temp) = temperature {
            if self.last_temperature != Some(temp) {
                self.last_temperature = Some(temp);
                self.emit(emitter, SYSTEM_TOPIC, INTERNAL_TEMP.name, temp)?;
            }
        }

        if status == Some(STANDBY_NO_IRRADIATION) {
            debug!("standby: no irradiation, skipping metrics");
            return Ok(CycleOutcome::Standby);
        }

        let pv_strings = self.device.as_ref().map_or(0, |d| d.pv_string_count);
        let mut records = 0;

        for string_no in 0..pv_strings {
            let number = string_no.saturating_add(1);
            let (Some(voltage), Some(current)) = (pv_voltage(number), pv_current(number)) else {
                warn!(string_no, "PV string address out of range, skipping");
                continue;
            };
            for spec in [voltage, current] {
                let value = self.read_number(spec, emitter).await.unwrap_or(0.0);
                self.emit(emitter, METRICS_TOPIC, format!("pv{}_{}", string_no, spec.name), value)?;
                records += 1;
            }
        }

        for spec in METRICS {
            let value = self.read_number(*spec, emitter).await.unwrap_or(0.0);
            self.emit(emitter, METRICS_TOPIC, spec.name, value)?;
            records += 1;
        }

        Ok(CycleOutcome::Measured { records })
    }

    /// Wait for `pause`, `false` when cancelled first
    async fn pause(pause: Duration, cancel: &CancellationToken) -> bool {
        if pause.is_zero() {
            tokio::task::yield_now().await;
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(pause) => true,
        }
    }
}

impl<T: RegisterTransport> MeasurementProducer for Sun2000Poller<T> {
    fn name(&self) -> &str {
        "sun2000"
    }

    #[instrument(name = "sun2000_poller", skip_all)]
    async fn run(&mut self, emitter: RecordEmitter, cancel: CancellationToken) -> Result<()> {
        info!("starting inverter poller");

        if self.device.is_none() {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = self.identify(&emitter) => {}
            }
        }

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.poll_cycle(&emitter) => outcome?,
            };
            emitter.metrics().record_poll_cycle();

            let pause = match outcome {
                CycleOutcome::Standby => self.standby_cooldown,
                CycleOutcome::Measured { records } => {
                    debug!(records, "poll cycle complete");
                    self.poll_interval
                }
            };
            if !Self::pause(pause, &cancel).await {
                break;
            }
        }

        info!("inverter poller stopped");
        Ok(())
    }
}
