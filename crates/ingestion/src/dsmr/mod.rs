//! DSMR (Dutch Smart Meter Requirements) P1 telegram ingestion

mod catalog;
mod meter;
mod reader;
mod telegram;

pub use catalog::{
    CatalogEntry, FieldCatalog, FieldDefinition, CHECKSUM_ID, DSMR5_FIELDS, PROVIDER_ID,
    TOTAL_CONSUMED_ID, TOTAL_RETURNED_ID, UNKNOWN_FIELD,
};
pub use meter::DsmrMeter;
pub use reader::TelegramReader;
pub use telegram::{LineOutcome, ParsedTelegram, TelegramParser, DSMR_SOURCE};
