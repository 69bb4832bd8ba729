//! DSMR telegram parsing
//!
//! Turns one complete telegram into normalized records. Lines are parsed
//! independently, so a malformed line never stops the rest of the telegram.

use contracts::{DataType, MeasurementRecord, MeasurementValue};
use regex::Regex;
use tracing::{debug, warn};

use super::catalog::{
    CatalogEntry, FieldCatalog, CHECKSUM_ID, PROVIDER_ID, TOTAL_CONSUMED_ID, TOTAL_RETURNED_ID,
};
use crate::error::{IngestionError, Result};

/// Source prefix of every DSMR record
pub const DSMR_SOURCE: &str = "dsmr";

/// Result of parsing one telegram
#[derive(Debug, Default)]
pub struct ParsedTelegram {
    /// Records in line order
    pub records: Vec<MeasurementRecord>,
    /// Lines that failed numeric coercion
    pub parse_errors: usize,
    /// Lines dropped by the non-zero validation rule
    pub skipped: usize,
}

/// Parsed outcome of a single line
#[derive(Debug, PartialEq)]
pub enum LineOutcome {
    Record(MeasurementRecord),
    /// Blank line
    Empty,
    /// Value was empty or zero on a validated field
    Skipped,
}

/// DSMR telegram parser
pub struct TelegramParser {
    catalog: FieldCatalog,
    consumed: [Regex; 2],
    returned: [Regex; 2],
}

impl TelegramParser {
    /// Parser over the DSMR 5.0 field catalog
    pub fn new() -> Result<Self> {
        Self::with_catalog(FieldCatalog::dsmr5()?)
    }

    pub fn with_catalog(catalog: FieldCatalog) -> Result<Self> {
        Ok(Self {
            catalog,
            consumed: [
                Regex::new(r"^1-0:1\.8\.1\((\d{6}\.\d{3})\*kWh\)")?,
                Regex::new(r"^1-0:1\.8\.2\((\d{6}\.\d{3})\*kWh\)")?,
            ],
            returned: [
                Regex::new(r"^1-0:2\.8\.1\((\d{6}\.\d{3})\*kWh\)")?,
                Regex::new(r"^1-0:2\.8\.2\((\d{6}\.\d{3})\*kWh\)")?,
            ],
        })
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    /// Append synthetic total consumed/returned lines
    ///
    /// Tariff 1 and tariff 2 readings are summed. A missing or malformed
    /// tariff line counts as 0.0.
    pub fn preprocess(&self, telegram: &str) -> String {
        let mut consumed = 0.0;
        let mut returned = 0.0;

        for line in telegram.lines() {
            consumed += sum_matches(&self.consumed, line);
            returned += sum_matches(&self.returned, line);
        }

        let mut processed = String::with_capacity(telegram.len() + 64);
        processed.push_str(telegram);
        if !processed.is_empty() && !processed.ends_with('\n') {
            processed.push('\n');
        }
        processed.push_str(&format!("{TOTAL_CONSUMED_ID}({consumed:010.3}*kWh)\n"));
        processed.push_str(&format!("{TOTAL_RETURNED_ID}({returned:010.3}*kWh)\n"));
        processed
    }

    /// Parse one telegram line
    ///
    /// # Errors
    /// `ParseFailed` when a numeric field cannot be coerced.
    pub fn parse_line(&self, line: &str) -> Result<LineOutcome> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(LineOutcome::Empty);
        }

        let (identifier, payload) = split_identifier(line);
        let entry = self.catalog.lookup(identifier);
        let definition = entry.definition;

        let raw = if entry.is_unknown() {
            line
        } else {
            entry.extract(payload)
        };

        let value = coerce(entry, identifier, raw)?;

        if definition.validate_non_zero && value.is_empty_or_zero() {
            warn!(
                field = definition.description,
                value = %value,
                "telegram field has invalid value, skipping"
            );
            return Ok(LineOutcome::Skipped);
        }

        Ok(LineOutcome::Record(MeasurementRecord::new(
            DSMR_SOURCE,
            definition.topic,
            definition.tag,
            value,
            definition.max_rate_per_hour,
        )))
    }

    /// Preprocess and parse a complete telegram
    pub fn parse_telegram(&self, telegram: &str) -> ParsedTelegram {
        let processed = self.preprocess(telegram);
        let mut parsed = ParsedTelegram::default();

        for line in processed.lines() {
            match self.parse_line(line) {
                Ok(LineOutcome::Record(record)) => parsed.records.push(record),
                Ok(LineOutcome::Skipped) => parsed.skipped += 1,
                Ok(LineOutcome::Empty) => {}
                Err(e) => {
                    warn!(line, error = %e, "failed to parse telegram line");
                    parsed.parse_errors += 1;
                }
            }
        }

        debug!(
            records = parsed.records.len(),
            parse_errors = parsed.parse_errors,
            skipped = parsed.skipped,
            "telegram parsed"
        );
        parsed
    }
}

fn sum_matches(patterns: &[Regex], line: &str) -> f64 {
    patterns
        .iter()
        .filter_map(|re| re.captures(line))
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<f64>().ok()))
        .sum()
}

/// Split a line into its identifier and the remaining payload
///
/// Checksum (`!`) and provider (`/`) lines map to virtual identifiers.
fn split_identifier(line: &str) -> (&str, &str) {
    if let Some(rest) = line.strip_prefix('!') {
        return (CHECKSUM_ID, rest);
    }
    if line.starts_with('/') {
        return (PROVIDER_ID, line);
    }
    match line.find('(') {
        Some(idx) => (&line[..idx], &line[idx..]),
        None => (line, ""),
    }
}

/// Coerce the raw text to the field's datatype and apply the multiplier
fn coerce(entry: &CatalogEntry, identifier: &str, raw: &str) -> Result<MeasurementValue> {
    let definition = entry.definition;
    let parse_err = |message: String| IngestionError::ParseFailed {
        identifier: identifier.to_string(),
        message,
    };

    match definition.data_type {
        DataType::String => Ok(MeasurementValue::Text(raw.to_string())),
        DataType::Int => {
            let value: i64 = raw
                .trim()
                .parse()
                .map_err(|e| parse_err(format!("'{raw}' is not an int: {e}")))?;
            Ok(MeasurementValue::Int(
                value * i64::from(definition.multiplier),
            ))
        }
        DataType::Float => {
            let value: f64 = raw
                .trim()
                .parse()
                .map_err(|e| parse_err(format!("'{raw}' is not a float: {e}")))?;
            Ok(MeasurementValue::Float(
                value * f64::from(definition.multiplier),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TELEGRAM: &str = "/ISK5\\2M550E-1011\r\n\
\r\n\
1-3:0.2.8(50)\r\n\
0-0:1.0.0(230615120000S)\r\n\
0-0:96.1.1(4530303434303037313331363130333136)\r\n\
1-0:1.8.1(001234.567*kWh)\r\n\
1-0:1.8.2(000100.000*kWh)\r\n\
1-0:2.8.1(000000.000*kWh)\r\n\
1-0:2.8.2(000000.000*kWh)\r\n\
0-0:96.14.0(0002)\r\n\
1-0:1.7.0(01.193*kW)\r\n\
1-0:32.7.0(230.1*V)\r\n\
0-1:24.2.3(230615115500S)(00842.123*m3)\r\n\
!5A2B\r\n";

    fn parser() -> TelegramParser {
        TelegramParser::new().unwrap()
    }

    fn record(outcome: LineOutcome) -> MeasurementRecord {
        match outcome {
            LineOutcome::Record(r) => r,
            other => panic!("expected record, got {other:?}"),
        }
    }

    fn float(value: &MeasurementValue) -> f64 {
        match value {
            MeasurementValue::Float(v) => *v,
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn test_preprocess_sums_tariffs() {
        let processed = parser().preprocess(TELEGRAM);
        assert!(processed.contains("1-0:1.8.3(001334.567*kWh)"), "{processed}");
        assert!(processed.contains("1-0:2.8.3(000000.000*kWh)"), "{processed}");
    }

    #[test]
    fn test_preprocess_missing_tariff_counts_as_zero() {
        let processed = parser().preprocess("1-0:1.8.2(000100.000*kWh)\n!0000\n");
        assert!(processed.contains("1-0:1.8.3(000100.000*kWh)"));
    }

    #[test]
    fn test_preprocess_malformed_tariff_ignored() {
        // Not the fixed-width 6.3 format
        let processed = parser().preprocess("1-0:1.8.1(12.5*kWh)\n1-0:1.8.2(000002.000*kWh)\n");
        assert!(processed.contains("1-0:1.8.3(000002.000*kWh)"));
    }

    #[test]
    fn test_float_field_is_scaled() {
        let r = record(parser().parse_line("1-0:1.7.0(01.193*kW)").unwrap());
        assert_eq!(r.source, "dsmr");
        assert_eq!(r.topic, "el");
        assert_eq!(r.tag, "p_consumed");
        assert_eq!(r.max_rate_per_hour, 60);
        assert!((float(&r.value) - 1193.0).abs() < 1e-6);
    }

    #[test]
    fn test_int_field() {
        let r = record(parser().parse_line("0-0:96.14.0(0002)").unwrap());
        assert_eq!(r.tag, "tariff_indicator");
        assert_eq!(r.value, MeasurementValue::Int(2));
    }

    #[test]
    fn test_string_field_keeps_raw_text() {
        let r = record(parser().parse_line("1-3:0.2.8(50)").unwrap());
        assert_eq!(r.tag, "dsmr_version");
        assert_eq!(r.value, MeasurementValue::Text("50".into()));
    }

    #[test]
    fn test_gas_takes_last_group() {
        let r = record(
            parser()
                .parse_line("0-1:24.2.3(230615115500S)(00842.123*m3)")
                .unwrap(),
        );
        assert_eq!(r.topic, "gas");
        assert!((float(&r.value) - 842_123.0).abs() < 1e-6);
    }

    #[test]
    fn test_checksum_and_provider_lines() {
        let p = parser();
        let checksum = record(p.parse_line("!5A2B\r").unwrap());
        assert_eq!(checksum.tag, "checksum");
        assert_eq!(checksum.value, MeasurementValue::Text("5A2B".into()));

        let provider = record(p.parse_line("/ISK5\\2M550E-1011").unwrap());
        assert_eq!(provider.tag, "provider");
        assert_eq!(
            provider.value,
            MeasurementValue::Text("/ISK5\\2M550E-1011".into())
        );
    }

    #[test]
    fn test_unknown_identifier_routed_to_errors() {
        let r = record(parser().parse_line("0-0:96.99.9(1234)").unwrap());
        assert_eq!(r.topic, "errors");
        assert_eq!(r.tag, "err");
        assert_eq!(r.max_rate_per_hour, 0);
        assert_eq!(r.value, MeasurementValue::Text("0-0:96.99.9(1234)".into()));
    }

    #[test]
    fn test_validation_skips_zero() {
        let p = parser();
        assert_eq!(
            p.parse_line("1-0:1.8.1(000000.000*kWh)").unwrap(),
            LineOutcome::Skipped
        );
        let r = record(p.parse_line("1-0:1.8.1(000001.000*kWh)").unwrap());
        assert!((float(&r.value) - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_allowed_without_validation() {
        let r = record(parser().parse_line("1-0:2.7.0(00.000*kW)").unwrap());
        assert_eq!(r.value, MeasurementValue::Float(0.0));
    }

    #[test]
    fn test_numeric_coercion_failure_is_error() {
        let err = parser().parse_line("1-0:32.7.0(abc*V)").unwrap_err();
        assert!(matches!(err, IngestionError::ParseFailed { .. }));
    }

    #[test]
    fn test_parse_telegram_isolates_bad_lines() {
        let telegram = "1-0:32.7.0(abc*V)\n1-0:52.7.0(231.0*V)\n!0000\n";
        let parsed = parser().parse_telegram(telegram);
        assert_eq!(parsed.parse_errors, 1);
        let tags: Vec<_> = parsed.records.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags[0], "voltage_L2");
        assert!(tags.contains(&"checksum"));
    }

    #[test]
    fn test_parse_full_telegram() {
        let parsed = parser().parse_telegram(TELEGRAM);
        let tags: Vec<_> = parsed.records.iter().map(|r| r.tag.as_str()).collect();

        assert_eq!(tags.first(), Some(&"provider"));
        assert!(tags.contains(&"timestamp"));
        assert!(tags.contains(&"el_consumed1"));
        assert!(tags.contains(&"el_consumed"));
        // returned totals are zero and validated
        assert!(!tags.contains(&"el_returned"));
        assert_eq!(parsed.skipped, 3);
        assert_eq!(parsed.parse_errors, 0);

        let total = parsed
            .records
            .iter()
            .find(|r| r.tag == "el_consumed")
            .unwrap();
        assert!((float(&total.value) - 1_334_567.0).abs() < 1e-3);
    }
}
