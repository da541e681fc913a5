//! S7-family adapter over an opaque transport.
//!
//! The wire protocol lives behind [`S7Transport`]; this adapter maps the
//! uniform contract onto the input (`EB`) and output (`AB`) process images.
//! Words are big-endian; analog outputs are signed.

use tracing::{debug, info, warn};

use crate::adapter::{ProtocolAdapter, bit_of, check_bit, check_range, with_bit};
use crate::error::{AdapterError, AdapterResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// Process input image (written by the simulator).
    Inputs,
    /// Process output image (read by the simulator).
    Outputs,
}

/// Raw area access to an S7 controller or simulator.
pub trait S7Transport: Send {
    fn connect(&mut self, host: &str, rack: u16, slot: u16) -> AdapterResult<()>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn read_area(&mut self, area: Area, start: u16, len: u16) -> AdapterResult<Vec<u8>>;
    fn write_area(&mut self, area: Area, start: u16, data: &[u8]) -> AdapterResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S7Endpoint {
    pub host: String,
    pub rack: u16,
    pub slot: u16,
}

/// Rack/slot pairs tried after the configured one.
pub const FALLBACK_RACK_SLOTS: [(u16, u16); 3] = [(0, 1), (0, 2), (0, 0)];

#[derive(Debug)]
pub struct S7Adapter<T: S7Transport> {
    transport: T,
    endpoint: S7Endpoint,
}

impl<T: S7Transport> S7Adapter<T> {
    pub fn new(transport: T, endpoint: S7Endpoint) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Rack/slot that finally answered; updated by `connect`.
    pub fn endpoint(&self) -> &S7Endpoint {
        &self.endpoint
    }

    fn online(&self) -> AdapterResult<()> {
        if self.transport.is_connected() {
            Ok(())
        } else {
            Err(AdapterError::NotConnected)
        }
    }

    fn read_exact(&mut self, area: Area, start: u16, len: u16) -> AdapterResult<Vec<u8>> {
        self.online()?;
        let data = self.transport.read_area(area, start, len)?;
        if data.len() < len as usize {
            return Err(AdapterError::Protocol(format!(
                "short read at {start}: {} of {len} bytes",
                data.len()
            )));
        }
        Ok(data)
    }
}

impl<T: S7Transport> ProtocolAdapter for S7Adapter<T> {
    fn name(&self) -> &'static str {
        "s7"
    }

    /// Try the configured rack/slot first, then the usual alternatives.
    fn connect(&mut self) -> AdapterResult<()> {
        let configured = (self.endpoint.rack, self.endpoint.slot);
        let candidates = std::iter::once(configured)
            .chain(FALLBACK_RACK_SLOTS.into_iter().filter(|c| *c != configured));

        let mut last_err = None;
        for (rack, slot) in candidates {
            match self.transport.connect(&self.endpoint.host, rack, slot) {
                Ok(()) if self.transport.is_connected() => {
                    if (rack, slot) != configured {
                        warn!(rack, slot, "connected on alternate rack/slot");
                    }
                    self.endpoint.rack = rack;
                    self.endpoint.slot = slot;
                    info!(host = %self.endpoint.host, rack, slot, "connected to S7 controller");
                    return Ok(());
                }
                Ok(()) => debug!(rack, slot, "transport accepted but reports no link"),
                Err(e) => {
                    debug!(rack, slot, error = %e, "S7 connect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(AdapterError::ConnectFailed(match last_err {
            Some(e) => format!("{}: {e}", self.endpoint.host),
            None => format!("{}: no rack/slot answered", self.endpoint.host),
        }))
    }

    fn disconnect(&mut self) -> AdapterResult<()> {
        self.transport.disconnect();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn get_digital_output(&mut self, byte: u16, bit: u8) -> AdapterResult<bool> {
        check_bit(bit)?;
        let data = self.read_exact(Area::Outputs, byte, 1)?;
        Ok(bit_of(data[0], bit))
    }

    fn set_digital_input(&mut self, byte: u16, bit: u8, value: bool) -> AdapterResult<bool> {
        check_bit(bit)?;
        let data = self.read_exact(Area::Inputs, byte, 1)?;
        self.transport
            .write_area(Area::Inputs, byte, &[with_bit(data[0], bit, value)])?;
        Ok(value)
    }

    fn get_analog_output(&mut self, byte: u16) -> AdapterResult<i16> {
        let data = self.read_exact(Area::Outputs, byte, 2)?;
        Ok(i16::from_be_bytes([data[0], data[1]]))
    }

    fn set_analog_input(&mut self, byte: u16, value: u16) -> AdapterResult<u16> {
        self.online()?;
        self.transport
            .write_area(Area::Inputs, byte, &value.to_be_bytes())?;
        Ok(value)
    }

    fn reset_input_range(&mut self, lo: u16, hi: u16) -> AdapterResult<()> {
        check_range(lo, hi)?;
        self.online()?;
        let zeros = vec![0u8; (hi - lo) as usize + 1];
        self.transport.write_area(Area::Inputs, lo, &zeros)
    }

    fn reset_output_range(&mut self, lo: u16, hi: u16) -> AdapterResult<()> {
        check_range(lo, hi)?;
        self.online()?;
        let zeros = vec![0u8; (hi - lo) as usize + 1];
        self.transport.write_area(Area::Outputs, lo, &zeros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two 64-byte images; answers only on one rack/slot.
    #[derive(Debug, Default)]
    struct FakeTransport {
        answers_on: Option<(u16, u16)>,
        connected: bool,
        attempts: Vec<(u16, u16)>,
        inputs: Vec<u8>,
        outputs: Vec<u8>,
    }

    impl FakeTransport {
        fn answering(rack: u16, slot: u16) -> Self {
            Self {
                answers_on: Some((rack, slot)),
                inputs: vec![0; 64],
                outputs: vec![0; 64],
                ..Default::default()
            }
        }

        fn image(&mut self, area: Area) -> &mut Vec<u8> {
            match area {
                Area::Inputs => &mut self.inputs,
                Area::Outputs => &mut self.outputs,
            }
        }
    }

    impl S7Transport for FakeTransport {
        fn connect(&mut self, _host: &str, rack: u16, slot: u16) -> AdapterResult<()> {
            self.attempts.push((rack, slot));
            if self.answers_on == Some((rack, slot)) {
                self.connected = true;
                Ok(())
            } else {
                Err(AdapterError::ConnectFailed("no answer".into()))
            }
        }

        fn disconnect(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn read_area(&mut self, area: Area, start: u16, len: u16) -> AdapterResult<Vec<u8>> {
            let s = start as usize;
            Ok(self.image(area)[s..s + len as usize].to_vec())
        }

        fn write_area(&mut self, area: Area, start: u16, data: &[u8]) -> AdapterResult<()> {
            let s = start as usize;
            self.image(area)[s..s + data.len()].copy_from_slice(data);
            Ok(())
        }
    }

    fn endpoint(rack: u16, slot: u16) -> S7Endpoint {
        S7Endpoint {
            host: "192.168.0.1".into(),
            rack,
            slot,
        }
    }

    #[test]
    fn connect_falls_back_to_alternate_slot() {
        let mut adapter = S7Adapter::new(FakeTransport::answering(0, 2), endpoint(0, 3));
        adapter.connect().unwrap();
        assert_eq!(adapter.transport().attempts, vec![(0, 3), (0, 1), (0, 2)]);
        assert_eq!(adapter.endpoint().slot, 2);
    }

    #[test]
    fn connect_reports_failure_after_all_candidates() {
        let mut adapter = S7Adapter::new(FakeTransport::answering(5, 5), endpoint(0, 1));
        let err = adapter.connect().unwrap_err();
        assert!(matches!(err, AdapterError::ConnectFailed(_)));
        // Configured pair is not retried from the fallback list.
        assert_eq!(adapter.transport().attempts.len(), 3);
    }

    #[test]
    fn image_access() {
        let mut adapter = S7Adapter::new(FakeTransport::answering(0, 1), endpoint(0, 1));
        adapter.connect().unwrap();
        adapter.set_digital_input(1, 0, true).unwrap();
        adapter.set_digital_input(1, 7, true).unwrap();
        assert_eq!(adapter.transport().inputs[1], 0b1000_0001);

        adapter.set_analog_input(2, 27648).unwrap();
        assert_eq!(&adapter.transport().inputs[2..4], &[0x6C, 0x00]);

        adapter.transport.outputs[4..6].copy_from_slice(&(-100i16).to_be_bytes());
        assert_eq!(adapter.get_analog_output(4).unwrap(), -100);
        adapter.transport.outputs[0] = 0b0000_0100;
        assert!(adapter.get_digital_output(0, 2).unwrap());

        adapter.reset_input_range(0, 3).unwrap();
        assert!(adapter.transport().inputs[..4].iter().all(|b| *b == 0));
    }

    #[test]
    fn io_after_disconnect_fails() {
        let mut adapter = S7Adapter::new(FakeTransport::answering(0, 1), endpoint(0, 1));
        adapter.connect().unwrap();
        adapter.disconnect().unwrap();
        assert!(matches!(
            adapter.get_digital_output(0, 0),
            Err(AdapterError::NotConnected)
        ));
    }
}
