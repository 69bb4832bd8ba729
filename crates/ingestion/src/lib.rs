//! # Ingestion Pipeline
//!
//! Device measurement ingestion.
//!
//! Responsibilities:
//! - Read DSMR P1 telegrams from the smart meter serial port
//! - Poll the SUN2000 inverter register map over Modbus RTU
//! - Normalize readings into `MeasurementRecord`
//! - Place records on the measurement queue (async-channel)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{DsmrMeter, IngestionPipeline};
//!
//! let mut pipeline = IngestionPipeline::new();
//! let rx = pipeline.take_receiver().unwrap();
//!
//! pipeline.spawn(DsmrMeter::new("/dev/ttyUSB0", &config.dsmr)?);
//!
//! while let Ok(record) = rx.recv().await {
//!     // Dispatch record
//! }
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use ingestion::{MockRegisterTransport, Sun2000Poller};
//!
//! let mock = MockRegisterTransport::new();
//! mock.set_register(32089, 0x0200);
//! pipeline.spawn(Sun2000Poller::new(mock.clone(), &config.sun2000));
//! ```

pub mod dsmr;
mod error;
mod metrics;
mod pipeline;
mod producer;
mod retry;
pub mod sun2000;

// Re-exports
pub use contracts::MeasurementRecord;
pub use dsmr::{DsmrMeter, FieldCatalog, TelegramParser};
pub use error::{IngestionError, Result};
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use pipeline::{IngestionPipeline, ProducerExit, RecordEmitter};
pub use producer::{LocalMeasurementProducer, MeasurementProducer};
pub use retry::{BoxFuture, RetryOutcome, RetryPolicy};
pub use sun2000::{MockRegisterTransport, ModbusRtuTransport, RegisterTransport, Sun2000Poller};
