//! Inverter device status codes (register 32089)

/// 夜间无辐照待机，轮询进入冷却
pub const STANDBY_NO_IRRADIATION: u16 = 0xa000;

/// Description for codes outside the table
pub const INVALID_STATUS: &str = "Invalid status";

pub const STATUS_CODES: &[(u16, &str)] = &[
    (0x0000, "Standby: initializing"),
    (0x0001, "Standby: detecting insulation resistance"),
    (0x0002, "Standby: detecting irradiation"),
    (0x0003, "Standby: grid detecting"),
    (0x0100, "Starting"),
    (0x0200, "On-grid (Off-grid mode: running)"),
    (
        0x0201,
        "Grid connection: power limited (Off-grid mode: running: power limited)",
    ),
    (
        0x0202,
        "Grid connection: self-derating (Off-grid mode: running: self-derating)",
    ),
    (0x0300, "Shutdown: fault"),
    (0x0301, "Shutdown: command"),
    (0x0302, "Shutdown: OVGR"),
    (0x0303, "Shutdown: communication disconnected"),
    (0x0304, "Shutdown: power limited"),
    (0x0305, "Shutdown: manual startup required"),
    (0x0306, "Shutdown: DC switches disconnected"),
    (0x0307, "Shutdown: rapid cutoff"),
    (0x0308, "Shutdown: input underpower"),
    (0x0401, "Grid scheduling: cos F-P curve"),
    (0x0402, "Grid scheduling: Q-U curve"),
    (0x0403, "Grid scheduling: PF-U curve"),
    (0x0404, "Grid scheduling: dry contact"),
    (0x0405, "Grid scheduling: Q-P curve"),
    (0x0500, "Spot-check ready"),
    (0x0501, "Spot-checking"),
    (0x0600, "Inspecting"),
    (0x0700, "AFCI self check"),
    (0x0800, "I-V scanning"),
    (0x0900, "DC input detection"),
    (0x0a00, "Running: off-grid charging"),
    (STANDBY_NO_IRRADIATION, "Standby: no irradiation"),
];

/// Human readable description of a status code
pub fn status_description(code: u16) -> &'static str {
    STATUS_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, description)| *description)
        .unwrap_or(INVALID_STATUS)
}
