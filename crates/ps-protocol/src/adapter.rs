//! The uniform controller I/O contract.

use crate::error::{AdapterError, AdapterResult};

/// Bit/word access to a controller's process image.
///
/// Digital inputs and analog inputs are what the simulator writes (sensors,
/// operator commands); digital and analog outputs are what it reads
/// (actuator commands). Every call may block up to the adapter's I/O timeout
/// and must fail rather than stall. Adapters never retry.
pub trait ProtocolAdapter: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn connect(&mut self) -> AdapterResult<()>;

    fn disconnect(&mut self) -> AdapterResult<()>;

    /// Live link state, not "was connected once".
    fn is_connected(&self) -> bool;

    fn get_digital_output(&mut self, byte: u16, bit: u8) -> AdapterResult<bool>;

    /// Write one bit, leaving the other seven bits of the byte untouched.
    fn set_digital_input(&mut self, byte: u16, bit: u8, value: bool) -> AdapterResult<bool>;

    /// Signed 16-bit view of an analog output word.
    fn get_analog_output(&mut self, byte: u16) -> AdapterResult<i16>;

    /// Write an analog input word; returns the value written.
    fn set_analog_input(&mut self, byte: u16, value: u16) -> AdapterResult<u16>;

    /// Zero the input image between `lo` and `hi` (inclusive bytes).
    fn reset_input_range(&mut self, lo: u16, hi: u16) -> AdapterResult<()>;

    /// Zero the output image between `lo` and `hi` (inclusive bytes).
    fn reset_output_range(&mut self, lo: u16, hi: u16) -> AdapterResult<()>;
}

pub(crate) fn check_bit(bit: u8) -> AdapterResult<()> {
    if bit > 7 {
        return Err(AdapterError::InvalidAddress(format!("bit {bit} out of range 0..=7")));
    }
    Ok(())
}

pub(crate) fn check_range(lo: u16, hi: u16) -> AdapterResult<()> {
    if hi < lo {
        return Err(AdapterError::InvalidAddress(format!("empty byte range {lo}..={hi}")));
    }
    Ok(())
}

pub(crate) fn with_bit(byte: u8, bit: u8, value: bool) -> u8 {
    if value { byte | (1 << bit) } else { byte & !(1 << bit) }
}

pub(crate) fn bit_of(byte: u8, bit: u8) -> bool {
    (byte >> bit) & 1 != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_helpers_preserve_neighbours() {
        let b = with_bit(0b1010_0001, 3, true);
        assert_eq!(b, 0b1010_1001);
        assert_eq!(with_bit(b, 0, false), 0b1010_1000);
        assert!(bit_of(b, 7));
        assert!(!bit_of(b, 6));
        assert!(check_bit(8).is_err());
        assert!(check_range(4, 2).is_err());
    }
}
