//! Modbus TCP client adapter on the blocking `tokio-modbus` client.
//!
//! Image mapping:
//! - digital inputs: low byte of holding register `byte` (read-modify-write)
//! - digital outputs: coil `byte * 8 + bit`
//! - analog inputs: holding register `byte`
//! - analog outputs: holding register `byte + 32`
//!
//! Registers are unsigned; analog outputs above `i16::MAX` saturate.

use std::net::SocketAddr;
use std::time::Duration;

use tokio_modbus::client::sync::tcp::connect_slave_with_timeout;
use tokio_modbus::client::sync::{Context, Reader, Writer};
use tokio_modbus::{ExceptionCode, Slave};
use tracing::{debug, info, warn};

use crate::adapter::{ProtocolAdapter, check_bit, check_range, with_bit};
use crate::error::{AdapterError, AdapterResult};

/// Holding-register offset of the analog output area.
pub const AO_REGISTER_OFFSET: u16 = 32;

/// Most registers a single write-multiple request may carry.
const MAX_REGISTERS_PER_WRITE: usize = 123;

#[derive(Debug, Clone)]
pub struct ModbusConfig {
    pub server_addr: SocketAddr,
    pub unit_id: u8,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

impl ModbusConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            unit_id: 1,
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_millis(500),
        }
    }
}

/// Coil number of digital output `byte.bit`.
pub fn coil_address(byte: u16, bit: u8) -> AdapterResult<u16> {
    check_bit(bit)?;
    byte.checked_mul(8)
        .and_then(|c| c.checked_add(bit as u16))
        .ok_or_else(|| AdapterError::InvalidAddress(format!("coil for {byte}.{bit}")))
}

/// Holding register of analog output `byte`.
pub fn ao_register(byte: u16) -> AdapterResult<u16> {
    byte.checked_add(AO_REGISTER_OFFSET)
        .ok_or_else(|| AdapterError::InvalidAddress(format!("AO register for {byte}")))
}

/// Replace the low byte of `register` with `bit` set or cleared.
pub fn merge_input_bit(register: u16, bit: u8, value: bool) -> u16 {
    let low = with_bit((register & 0x00FF) as u8, bit, value);
    (register & 0xFF00) | low as u16
}

pub fn saturate_output(raw: u16) -> i16 {
    raw.min(i16::MAX as u16) as i16
}

pub struct ModbusTcpAdapter {
    config: ModbusConfig,
    context: Option<Context>,
}

impl std::fmt::Debug for ModbusTcpAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTcpAdapter")
            .field("config", &self.config)
            .field("connected", &self.context.is_some())
            .finish()
    }
}

impl ModbusTcpAdapter {
    pub fn new(config: ModbusConfig) -> Self {
        Self {
            config,
            context: None,
        }
    }

    /// Run one request. Transport failures drop the context so
    /// `is_connected` tells the truth; server exceptions keep it.
    fn call<T>(
        &mut self,
        what: &str,
        op: impl FnOnce(&mut Context) -> tokio_modbus::Result<T>,
    ) -> AdapterResult<T> {
        let ctx = self.context.as_mut().ok_or(AdapterError::NotConnected)?;
        match op(ctx) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(code)) => Err(exception(what, code)),
            Err(tokio_modbus::Error::Transport(e)) => {
                warn!(error = %e, what, "modbus exchange failed, dropping connection");
                self.context = None;
                Err(AdapterError::from_io(e, what))
            }
            Err(tokio_modbus::Error::Protocol(e)) => {
                Err(AdapterError::Protocol(format!("{what}: {e:?}")))
            }
        }
    }

    fn read_register(&mut self, address: u16) -> AdapterResult<u16> {
        let words = self.call("read holding register", |ctx| {
            ctx.read_holding_registers(address, 1)
        })?;
        words
            .first()
            .copied()
            .ok_or_else(|| AdapterError::Protocol("Short register response".into()))
    }

    fn write_register(&mut self, address: u16, value: u16) -> AdapterResult<()> {
        self.call("write holding register", |ctx| {
            ctx.write_single_register(address, value)
        })
    }

    fn write_zero_registers(&mut self, first: u16, count: usize) -> AdapterResult<()> {
        let mut address = first;
        let mut remaining = count;
        while remaining > 0 {
            let n = remaining.min(MAX_REGISTERS_PER_WRITE);
            let zeros = vec![0u16; n];
            self.call("zero holding registers", |ctx| {
                ctx.write_multiple_registers(address, &zeros)
            })?;
            address = address.wrapping_add(n as u16);
            remaining -= n;
        }
        Ok(())
    }
}

fn exception(what: &str, code: ExceptionCode) -> AdapterError {
    AdapterError::Protocol(format!("Modbus exception on {what}: {code:?}"))
}

impl ProtocolAdapter for ModbusTcpAdapter {
    fn name(&self) -> &'static str {
        "modbus-tcp"
    }

    fn connect(&mut self) -> AdapterResult<()> {
        info!(addr = %self.config.server_addr, "connecting to Modbus TCP server");
        let mut ctx = connect_slave_with_timeout(
            self.config.server_addr,
            Slave(self.config.unit_id),
            Some(self.config.connect_timeout),
        )
        .map_err(|e| AdapterError::ConnectFailed(format!("{}: {e}", self.config.server_addr)))?;
        ctx.set_timeout(self.config.io_timeout);
        self.context = Some(ctx);
        info!(addr = %self.config.server_addr, "connected to Modbus TCP server");
        Ok(())
    }

    fn disconnect(&mut self) -> AdapterResult<()> {
        if self.context.take().is_some() {
            debug!("closing Modbus TCP connection");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.context.is_some()
    }

    fn get_digital_output(&mut self, byte: u16, bit: u8) -> AdapterResult<bool> {
        let coil = coil_address(byte, bit)?;
        let bits = self.call("read coil", |ctx| ctx.read_coils(coil, 1))?;
        bits.first()
            .copied()
            .ok_or_else(|| AdapterError::Protocol("Short coil response".into()))
    }

    fn set_digital_input(&mut self, byte: u16, bit: u8, value: bool) -> AdapterResult<bool> {
        check_bit(bit)?;
        let current = self.read_register(byte)?;
        self.write_register(byte, merge_input_bit(current, bit, value))?;
        Ok(value)
    }

    fn get_analog_output(&mut self, byte: u16) -> AdapterResult<i16> {
        let register = ao_register(byte)?;
        Ok(saturate_output(self.read_register(register)?))
    }

    fn set_analog_input(&mut self, byte: u16, value: u16) -> AdapterResult<u16> {
        self.write_register(byte, value)?;
        Ok(value)
    }

    fn reset_input_range(&mut self, lo: u16, hi: u16) -> AdapterResult<()> {
        check_range(lo, hi)?;
        self.write_zero_registers(lo, (hi - lo) as usize + 1)
    }

    fn reset_output_range(&mut self, lo: u16, hi: u16) -> AdapterResult<()> {
        check_range(lo, hi)?;
        self.write_zero_registers(ao_register(lo)?, (hi - lo) as usize + 1)
    }
}
