//! SUN2000 inverter register map
//!
//! Addresses are holding registers read with function code 3. Multi-register
//! values are big-endian (high word first).

/// Register value layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterFormat {
    /// ASCII text, NUL padded
    Text,
    U16,
    I16,
    /// Two registers, signed
    I32,
}

/// One documented register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSpec {
    /// Output tag (PV string registers get their index prepended by the poller)
    pub name: &'static str,
    pub address: u16,
    /// Number of 16-bit registers
    pub count: u16,
    pub format: RegisterFormat,
    /// Decimal places, the raw value is divided by 10^decimals
    pub decimals: u32,
}

impl RegisterSpec {
    pub const fn text(name: &'static str, address: u16, count: u16) -> Self {
        Self {
            name,
            address,
            count,
            format: RegisterFormat::Text,
            decimals: 0,
        }
    }

    pub const fn unsigned(name: &'static str, address: u16, decimals: u32) -> Self {
        Self {
            name,
            address,
            count: 1,
            format: RegisterFormat::U16,
            decimals,
        }
    }

    pub const fn signed(name: &'static str, address: u16, decimals: u32) -> Self {
        Self {
            name,
            address,
            count: 1,
            format: RegisterFormat::I16,
            decimals,
        }
    }

    pub const fn long(name: &'static str, address: u16) -> Self {
        Self {
            name,
            address,
            count: 2,
            format: RegisterFormat::I32,
            decimals: 0,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.format, RegisterFormat::I16 | RegisterFormat::I32)
    }

    /// Decode a numeric register, `None` on short response or text format
    pub fn decode_number(&self, registers: &[u16]) -> Option<f64> {
        let raw = match self.format {
            RegisterFormat::Text => return None,
            RegisterFormat::U16 => f64::from(*registers.first()?),
            RegisterFormat::I16 => f64::from(*registers.first()? as i16),
            RegisterFormat::I32 => {
                let high = u32::from(*registers.first()?);
                let low = u32::from(*registers.get(1)?);
                f64::from(((high << 16) | low) as i32)
            }
        };
        Some(raw / 10f64.powi(self.decimals as i32))
    }

    /// Decode a text register with trailing NUL padding removed
    pub fn decode_text(&self, registers: &[u16]) -> String {
        let bytes: Vec<u8> = registers.iter().flat_map(|r| r.to_be_bytes()).collect();
        String::from_utf8_lossy(&bytes)
            .trim_end_matches('\0')
            .to_string()
    }
}

pub const MODEL: RegisterSpec = RegisterSpec::text("model", 30000, 15);
pub const MODEL_ID: RegisterSpec = RegisterSpec::unsigned("model_id", 30070, 0);
pub const PV_STRING_COUNT: RegisterSpec = RegisterSpec::unsigned("pv_string_count", 30071, 0);
pub const INTERNAL_TEMP: RegisterSpec = RegisterSpec::signed("internal_temp", 32087, 1);
pub const DEVICE_STATUS: RegisterSpec = RegisterSpec::unsigned("status_code", 32089, 0);

/// PV string registers end where `input_power` (32064) begins
pub const MAX_PV_STRINGS: u16 = 24;

fn pv_address(base: u16, string_no: u16) -> Option<u16> {
    string_no.checked_mul(2).and_then(|offset| base.checked_add(offset))
}

/// PV string voltage, strings are numbered from 1
///
/// `None` when the address does not fit in the register space.
pub fn pv_voltage(string_no: u16) -> Option<RegisterSpec> {
    pv_address(32014, string_no).map(|address| RegisterSpec::signed("voltage", address, 1))
}

/// PV string current, strings are numbered from 1
pub fn pv_current(string_no: u16) -> Option<RegisterSpec> {
    pv_address(32015, string_no).map(|address| RegisterSpec::signed("current", address, 2))
}

/// Metrics read every active cycle, in emission order
pub const METRICS: &[RegisterSpec] = &[
    RegisterSpec::unsigned("phase_a_voltage", 32069, 1),
    RegisterSpec::unsigned("phase_b_voltage", 32070, 1),
    RegisterSpec::unsigned("phase_c_voltage", 32071, 1),
    RegisterSpec::signed("phase_a_current", 32072, 3),
    RegisterSpec::signed("phase_b_current", 32074, 3),
    RegisterSpec::signed("phase_c_current", 32076, 3),
    RegisterSpec::long("input_power", 32064),
    RegisterSpec::long("active_power", 32080),
    RegisterSpec::long("reactive_power", 32082),
    RegisterSpec::signed("power_factor", 32084, 3),
    RegisterSpec::unsigned("efficiency", 32086, 2),
    RegisterSpec::long("day_power", 32078),
    RegisterSpec::long("total_power", 32106),
];

/// Every documented register, PV strings shown for string 1
pub fn register_map() -> Vec<RegisterSpec> {
    let mut map = vec![MODEL, MODEL_ID, PV_STRING_COUNT, DEVICE_STATUS, INTERNAL_TEMP];
    map.extend(pv_voltage(1));
    map.extend(pv_current(1));
    map.extend_from_slice(METRICS);
    map
}
