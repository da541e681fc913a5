//! LOGO! adapter over V-memory.
//!
//! Bits are addressed `V{byte}.{bit}` and words `VW{byte}`. Inputs and
//! outputs share V-memory; the output area for range resets starts at
//! [`OUTPUT_AREA_OFFSET`]. Analog outputs must sit on even bytes.

use std::fmt;

use tracing::{debug, info};

use crate::adapter::{ProtocolAdapter, check_bit, check_range};
use crate::error::{AdapterError, AdapterResult};

pub const OUTPUT_AREA_OFFSET: u16 = 1072;

pub const DEFAULT_LOCAL_TSAP: u16 = 0x0300;
pub const DEFAULT_REMOTE_TSAP: u16 = 0x0200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAddress {
    Bit { byte: u16, bit: u8 },
    Word { byte: u16 },
}

impl fmt::Display for VAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VAddress::Bit { byte, bit } => write!(f, "V{byte}.{bit}"),
            VAddress::Word { byte } => write!(f, "VW{byte}"),
        }
    }
}

/// V-memory access to a LOGO! controller.
pub trait VMemoryTransport: Send {
    fn connect(&mut self, host: &str, local_tsap: u16, remote_tsap: u16) -> AdapterResult<()>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Bits read as 0/1.
    fn read(&mut self, addr: VAddress) -> AdapterResult<u16>;
    fn write(&mut self, addr: VAddress, value: u16) -> AdapterResult<()>;
}

#[derive(Debug)]
pub struct LogoAdapter<T: VMemoryTransport> {
    transport: T,
    host: String,
    local_tsap: u16,
    remote_tsap: u16,
}

impl<T: VMemoryTransport> LogoAdapter<T> {
    pub fn new(transport: T, host: impl Into<String>, local_tsap: u16, remote_tsap: u16) -> Self {
        Self {
            transport,
            host: host.into(),
            local_tsap,
            remote_tsap,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn online(&self) -> AdapterResult<()> {
        if self.transport.is_connected() {
            Ok(())
        } else {
            Err(AdapterError::NotConnected)
        }
    }

    fn zero_words(&mut self, lo: u16, hi: u16) -> AdapterResult<()> {
        self.online()?;
        let mut byte = lo;
        loop {
            self.transport.write(VAddress::Word { byte }, 0)?;
            match byte.checked_add(2) {
                Some(next) if next <= hi => byte = next,
                _ => break,
            }
        }
        Ok(())
    }
}

impl<T: VMemoryTransport> ProtocolAdapter for LogoAdapter<T> {
    fn name(&self) -> &'static str {
        "logo"
    }

    fn connect(&mut self) -> AdapterResult<()> {
        self.transport
            .connect(&self.host, self.local_tsap, self.remote_tsap)
            .map_err(|e| AdapterError::ConnectFailed(format!("{}: {e}", self.host)))?;
        if !self.transport.is_connected() {
            return Err(AdapterError::ConnectFailed(format!(
                "{}: no session after connect",
                self.host
            )));
        }
        info!(
            host = %self.host,
            local_tsap = format_args!("{:#06x}", self.local_tsap),
            remote_tsap = format_args!("{:#06x}", self.remote_tsap),
            "connected to LOGO"
        );
        Ok(())
    }

    fn disconnect(&mut self) -> AdapterResult<()> {
        debug!(host = %self.host, "disconnecting LOGO");
        self.transport.disconnect();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn get_digital_output(&mut self, byte: u16, bit: u8) -> AdapterResult<bool> {
        check_bit(bit)?;
        self.online()?;
        Ok(self.transport.read(VAddress::Bit { byte, bit })? != 0)
    }

    fn set_digital_input(&mut self, byte: u16, bit: u8, value: bool) -> AdapterResult<bool> {
        check_bit(bit)?;
        self.online()?;
        self.transport
            .write(VAddress::Bit { byte, bit }, value as u16)?;
        Ok(value)
    }

    fn get_analog_output(&mut self, byte: u16) -> AdapterResult<i16> {
        if byte % 2 != 0 {
            return Err(AdapterError::InvalidAddress(format!(
                "VW{byte}: analog outputs must be even-addressed"
            )));
        }
        self.online()?;
        let raw = self.transport.read(VAddress::Word { byte })?;
        Ok(raw.min(i16::MAX as u16) as i16)
    }

    fn set_analog_input(&mut self, byte: u16, value: u16) -> AdapterResult<u16> {
        self.online()?;
        self.transport.write(VAddress::Word { byte }, value)?;
        Ok(value)
    }

    fn reset_input_range(&mut self, lo: u16, hi: u16) -> AdapterResult<()> {
        check_range(lo, hi)?;
        self.zero_words(lo, hi)
    }

    fn reset_output_range(&mut self, lo: u16, hi: u16) -> AdapterResult<()> {
        check_range(lo, hi)?;
        let lo = lo
            .checked_add(OUTPUT_AREA_OFFSET)
            .ok_or_else(|| AdapterError::InvalidAddress(format!("output area byte {lo}")))?;
        let hi = hi
            .checked_add(OUTPUT_AREA_OFFSET)
            .ok_or_else(|| AdapterError::InvalidAddress(format!("output area byte {hi}")))?;
        self.zero_words(lo, hi)
    }
}
