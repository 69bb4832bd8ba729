//! Huawei SUN2000 inverter over Modbus RTU

mod poller;
mod registers;
mod status;
mod transport;

pub use poller::{CycleOutcome, DeviceInfo, Sun2000Poller, SUN2000_RATE, SUN2000_SOURCE};
pub use registers::{
    pv_current, pv_voltage, register_map, RegisterFormat, RegisterSpec, DEVICE_STATUS,
    INTERNAL_TEMP, MAX_PV_STRINGS, METRICS, MODEL, MODEL_ID, PV_STRING_COUNT,
};
pub use status::{status_description, INVALID_STATUS, STANDBY_NO_IRRADIATION, STATUS_CODES};
pub use transport::{
    LocalRegisterTransport, ModbusRtuTransport, MockRegisterTransport, RegisterTransport,
};
