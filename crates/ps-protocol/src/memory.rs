//! In-process controller: two byte images behind a shared handle.
//!
//! Stands in for a controller when the operator GUI drives the process, and
//! lets tests play the controller side (set outputs, inspect inputs, see
//! every call the engine made).

use std::sync::{Arc, Mutex, MutexGuard};

use crate::adapter::{ProtocolAdapter, bit_of, check_bit, check_range, with_bit};
use crate::error::{AdapterError, AdapterResult};

pub const DEFAULT_IMAGE_SIZE: usize = 256;

/// One call made through the adapter contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    GetDigitalOutput { byte: u16, bit: u8 },
    SetDigitalInput { byte: u16, bit: u8, value: bool },
    GetAnalogOutput { byte: u16 },
    SetAnalogInput { byte: u16, value: u16 },
    ResetInputs { lo: u16, hi: u16 },
    ResetOutputs { lo: u16, hi: u16 },
}

impl AdapterCall {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            AdapterCall::SetDigitalInput { .. } | AdapterCall::SetAnalogInput { .. }
        )
    }
}

#[derive(Debug)]
struct MemoryState {
    inputs: Vec<u8>,
    outputs: Vec<u8>,
    connected: bool,
    reachable: bool,
    fail_resets: bool,
    calls: Vec<AdapterCall>,
}

/// Cloning yields another handle onto the same images.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::with_size(DEFAULT_IMAGE_SIZE)
    }

    pub fn with_size(bytes: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                inputs: vec![0; bytes],
                outputs: vec![0; bytes],
                connected: false,
                reachable: true,
                fail_resets: false,
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// When false, `connect` fails.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Simulate a dropped link: the next call fails with `NotConnected`.
    pub fn drop_link(&self) {
        self.lock().connected = false;
    }

    /// Make range resets fail (address/protocol mismatch).
    pub fn set_fail_resets(&self, fail: bool) {
        self.lock().fail_resets = fail;
    }

    // Controller side

    pub fn set_output_bit(&self, byte: u16, bit: u8, value: bool) {
        let mut state = self.lock();
        if let Some(b) = state.outputs.get_mut(byte as usize) {
            *b = with_bit(*b, bit & 7, value);
        }
    }

    pub fn set_output_word(&self, byte: u16, value: i16) {
        let mut state = self.lock();
        let at = byte as usize;
        if at + 1 < state.outputs.len() {
            state.outputs[at..at + 2].copy_from_slice(&value.to_be_bytes());
        }
    }

    pub fn input_bit(&self, byte: u16, bit: u8) -> bool {
        self.lock()
            .inputs
            .get(byte as usize)
            .is_some_and(|b| bit_of(*b, bit & 7))
    }

    pub fn input_word(&self, byte: u16) -> u16 {
        let state = self.lock();
        let at = byte as usize;
        if at + 1 < state.inputs.len() {
            u16::from_be_bytes([state.inputs[at], state.inputs[at + 1]])
        } else {
            0
        }
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.lock().calls.clone()
    }

    pub fn writes(&self) -> Vec<AdapterCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

impl MemoryState {
    fn online(&self) -> AdapterResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(AdapterError::NotConnected)
        }
    }

    fn span(len: usize, byte: u16, width: usize) -> AdapterResult<std::ops::Range<usize>> {
        let at = byte as usize;
        if at + width > len {
            return Err(AdapterError::InvalidAddress(format!(
                "byte {byte} outside {len}-byte image"
            )));
        }
        Ok(at..at + width)
    }
}

impl ProtocolAdapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn connect(&mut self) -> AdapterResult<()> {
        let mut state = self.lock();
        if !state.reachable {
            return Err(AdapterError::ConnectFailed("memory image unreachable".into()));
        }
        state.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> AdapterResult<()> {
        self.lock().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn get_digital_output(&mut self, byte: u16, bit: u8) -> AdapterResult<bool> {
        check_bit(bit)?;
        let mut state = self.lock();
        state.online()?;
        state.calls.push(AdapterCall::GetDigitalOutput { byte, bit });
        let range = MemoryState::span(state.outputs.len(), byte, 1)?;
        Ok(bit_of(state.outputs[range.start], bit))
    }

    fn set_digital_input(&mut self, byte: u16, bit: u8, value: bool) -> AdapterResult<bool> {
        check_bit(bit)?;
        let mut state = self.lock();
        state.online()?;
        state.calls.push(AdapterCall::SetDigitalInput { byte, bit, value });
        let range = MemoryState::span(state.inputs.len(), byte, 1)?;
        let b = &mut state.inputs[range.start];
        *b = with_bit(*b, bit, value);
        Ok(value)
    }

    fn get_analog_output(&mut self, byte: u16) -> AdapterResult<i16> {
        let mut state = self.lock();
        state.online()?;
        state.calls.push(AdapterCall::GetAnalogOutput { byte });
        let range = MemoryState::span(state.outputs.len(), byte, 2)?;
        let word = &state.outputs[range];
        Ok(i16::from_be_bytes([word[0], word[1]]))
    }

    fn set_analog_input(&mut self, byte: u16, value: u16) -> AdapterResult<u16> {
        let mut state = self.lock();
        state.online()?;
        state.calls.push(AdapterCall::SetAnalogInput { byte, value });
        let range = MemoryState::span(state.inputs.len(), byte, 2)?;
        state.inputs[range].copy_from_slice(&value.to_be_bytes());
        Ok(value)
    }

    fn reset_input_range(&mut self, lo: u16, hi: u16) -> AdapterResult<()> {
        check_range(lo, hi)?;
        let mut state = self.lock();
        state.online()?;
        state.calls.push(AdapterCall::ResetInputs { lo, hi });
        if state.fail_resets {
            return Err(AdapterError::Protocol("input range reset rejected".into()));
        }
        let range = MemoryState::span(state.inputs.len(), lo, (hi - lo) as usize + 1)?;
        state.inputs[range].fill(0);
        Ok(())
    }

    fn reset_output_range(&mut self, lo: u16, hi: u16) -> AdapterResult<()> {
        check_range(lo, hi)?;
        let mut state = self.lock();
        state.online()?;
        state.calls.push(AdapterCall::ResetOutputs { lo, hi });
        if state.fail_resets {
            return Err(AdapterError::Protocol("output range reset rejected".into()));
        }
        let range = MemoryState::span(state.outputs.len(), lo, (hi - lo) as usize + 1)?;
        state.outputs[range].fill(0);
        Ok(())
    }
}
