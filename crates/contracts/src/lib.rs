//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the logger.
//! Business crates depend only on this crate for cross-module types,
//! reverse dependencies are prohibited.
//!
//! ## Data Model
//! - `MeasurementRecord` is the single normalized unit flowing from producers
//!   (DSMR telegram parser, Sun2000 register poller) to sinks
//! - `max_rate_per_hour = 0` means the record is never throttled

mod blueprint;
mod error;
mod measurement;
mod sink;

pub use blueprint::*;
pub use error::*;
pub use measurement::*;
pub use sink::*;
