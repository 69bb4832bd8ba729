//! DataSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, MeasurementRecord};

/// Data output trait
///
/// All sink implementations must implement this trait. The rate limiting
/// is done by the dispatcher before `write` is called.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one measurement record
    ///
    /// # Errors
    /// Returns write error (should include context). The caller logs and
    /// drops the record, there is no retry.
    async fn write(&mut self, record: &MeasurementRecord) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
