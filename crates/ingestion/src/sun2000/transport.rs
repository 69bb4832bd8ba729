//! Register transports
//!
//! `ModbusRtuTransport` talks Modbus RTU over a serial port,
//! `MockRegisterTransport` serves scripted register values for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_modbus::client::{Context, Reader};
use tokio_modbus::Slave;
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};
use tracing::{debug, info};

use crate::error::{IngestionError, Result};

/// Holding register reader
#[trait_variant::make(RegisterTransport: Send)]
pub trait LocalRegisterTransport {
    /// Read `count` holding registers starting at `address`
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;
}

/// Modbus RTU client bound to one slave
pub struct ModbusRtuTransport {
    ctx: Context,
    timeout: Duration,
}

impl ModbusRtuTransport {
    /// Open the serial port (8N1) and attach the slave
    pub fn open(port: &str, baud_rate: u32, slave_id: u8, timeout: Duration) -> Result<Self> {
        let builder = tokio_serial::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(timeout);

        let serial = SerialStream::open(&builder).map_err(|e| IngestionError::SerialOpen {
            port: port.to_string(),
            message: e.to_string(),
        })?;

        info!(port, baud_rate, slave_id, "modbus RTU transport opened");
        Ok(Self {
            ctx: tokio_modbus::client::rtu::attach_slave(serial, Slave(slave_id)),
            timeout,
        })
    }
}

impl RegisterTransport for ModbusRtuTransport {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let read = tokio::time::timeout(self.timeout, self.ctx.read_holding_registers(address, count))
            .await
            .map_err(|_| IngestionError::Timeout {
                address,
                timeout_ms: self.timeout.as_millis() as u64,
            })?;

        let registers = read
            .map_err(|e| IngestionError::Transport {
                address,
                message: e.to_string(),
            })?
            .map_err(|e| IngestionError::Transport {
                address,
                message: format!("exception: {:?}", e),
            })?;

        debug!(address, count, "holding registers read");
        Ok(registers)
    }
}

#[derive(Debug, Default)]
struct MockState {
    registers: HashMap<u16, Vec<u16>>,
    failures: HashMap<u16, u32>,
    reads: Vec<(u16, u16)>,
}

/// Scripted transport
///
/// Clones share state, so a test can keep a handle while the poller owns
/// the other. Addresses without a value fail like an illegal data address.
#[derive(Debug, Clone, Default)]
pub struct MockRegisterTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockRegisterTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the registers starting at `address`
    pub fn set_registers(&self, address: u16, values: &[u16]) -> &Self {
        self.lock().registers.insert(address, values.to_vec());
        self
    }

    /// Set a single register
    pub fn set_register(&self, address: u16, value: u16) -> &Self {
        self.set_registers(address, &[value])
    }

    /// Fail the next `times` reads of `address`
    pub fn fail_next(&self, address: u16, times: u32) -> &Self {
        self.lock().failures.insert(address, times);
        self
    }

    /// Forget the value at `address` so every read fails
    pub fn clear_register(&self, address: u16) -> &Self {
        self.lock().registers.remove(&address);
        self
    }

    /// Every read attempt so far as `(address, count)`
    pub fn reads(&self) -> Vec<(u16, u16)> {
        self.lock().reads.clone()
    }

    /// Read attempts for one address
    pub fn read_count(&self, address: u16) -> usize {
        self.lock().reads.iter().filter(|(a, _)| *a == address).count()
    }
}

impl RegisterTransport for MockRegisterTransport {
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let mut state = self.lock();
        state.reads.push((address, count));

        if let Some(remaining) = state.failures.get_mut(&address) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(IngestionError::Transport {
                    address,
                    message: "scripted failure".to_string(),
                });
            }
        }

        match state.registers.get(&address) {
            Some(values) if values.len() >= count as usize => Ok(values[..count as usize].to_vec()),
            Some(values) => Err(IngestionError::Transport {
                address,
                message: format!("only {} of {} registers available", values.len(), count),
            }),
            None => Err(IngestionError::Transport {
                address,
                message: "exception: IllegalDataAddress".to_string(),
            }),
        }
    }
}
