//! Per-cycle exchange between the process status and the controller image.
//!
//! Each [`IoSyncEngine::sync`] runs the read path (controller outputs into
//! the status) to completion before the write path (status into controller
//! inputs) starts. Adapter failures abort the pass and propagate; the engine
//! never retries inline.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use ps_config::{AddressMap, Direction, IoAddress, Signal, SignalType};
use ps_core::{ANALOG_SPAN, raw_to_fraction, scale_to_raw};
use ps_process::{ControlMode, ControlSource, ProcessStatus, TankParams};
use ps_protocol::{AdapterError, ProtocolAdapter};
use tracing::{debug, info, warn};

use crate::debounce::{DEFAULT_TON_WINDOW, Ton};
use crate::error::SyncResult;
use crate::force::{ForcedValue, ForcedValues};

pub const DEFAULT_FORCE_WRITE_WINDOW: Duration = Duration::from_millis(500);

/// Digital on/off and analog position signals driving the same actuator.
const ACTUATORS: [(Signal, Signal); 3] = [
    (Signal::ValveInOnOff, Signal::ValveInPosition),
    (Signal::ValveOutOnOff, Signal::ValveOutPosition),
    (Signal::HeaterOnOff, Signal::HeaterPower),
];

const INDICATORS: [Signal; 4] = [
    Signal::Indicator1,
    Signal::Indicator2,
    Signal::Indicator3,
    Signal::Indicator4,
];

const ANALOG_MONITORS: [Signal; 3] = [Signal::Analog1, Signal::Analog2, Signal::Analog3];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub ton_window: Duration,
    pub force_write_window: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            ton_window: DEFAULT_TON_WINDOW,
            force_write_window: DEFAULT_FORCE_WRITE_WINDOW,
        }
    }
}

/// Everything one sync pass touches, borrowed from the driver.
pub struct SyncIo<'a> {
    pub adapter: &'a mut dyn ProtocolAdapter,
    pub map: &'a AddressMap,
    pub params: &'a TankParams,
    pub status: &'a mut ProcessStatus,
    pub forced: &'a ForcedValues,
    pub mode: ControlMode,
    pub now: Instant,
}

/// When a controller input goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WritePolicy {
    /// Level switches: on change.
    Switch,
    /// Measurements, sliders and setpoints: on change, and every cycle of
    /// the forced-write window.
    Analog,
    /// General start/stop/reset: TON debounced, then on change.
    Command,
    /// Auto/manual and control selectors: TON debounced, then on change or
    /// during the forced-write window.
    Mode,
    /// PID panel buttons: on change only.
    Button,
}

fn write_policy(signal: Signal) -> Option<WritePolicy> {
    use Signal::*;
    Some(match signal {
        LevelHigh | LevelLow => WritePolicy::Switch,
        LevelMeasurement | TemperatureMeasurement | TempSetpoint | LevelSetpoint | Control1
        | Control2 | Control3 => WritePolicy::Analog,
        Start | Stop | Reset => WritePolicy::Command,
        AutoMode | ManualMode | TempAnalogControl | TempDigitalControl | LevelAnalogControl
        | LevelDigitalControl => WritePolicy::Mode,
        PidStart | PidStop | PidReset => WritePolicy::Button,
        _ => return None,
    })
}

fn word(value: i32) -> u16 {
    value.clamp(0, u16::MAX as i32) as u16
}

/// Raw value the status wants on a controller input.
fn input_value(signal: Signal, status: &ProcessStatus, params: &TankParams) -> Option<u16> {
    use Signal::*;
    Some(match signal {
        LevelHigh => status.level_high as u16,
        LevelLow => status.level_low as u16,
        LevelMeasurement => scale_to_raw(status.volume, params.capacity(), ANALOG_SPAN),
        TemperatureMeasurement => scale_to_raw(status.temperature, params.boiling_temp, ANALOG_SPAN),
        PidStart => status.pid_start_cmd as u16,
        PidStop => status.pid_stop_cmd as u16,
        PidReset => status.pid_reset_cmd as u16,
        AutoMode => status.auto_mode as u16,
        ManualMode => status.manual_mode as u16,
        TempAnalogControl => status.temp_analog_control as u16,
        TempDigitalControl => status.temp_digital_control as u16,
        LevelAnalogControl => status.level_analog_control as u16,
        LevelDigitalControl => status.level_digital_control as u16,
        TempSetpoint => scale_to_raw(status.temp_setpoint, params.boiling_temp, ANALOG_SPAN),
        LevelSetpoint => scale_to_raw(status.level_setpoint, params.capacity(), ANALOG_SPAN),
        Start => status.start_cmd as u16,
        Stop => status.stop_cmd as u16,
        Reset => status.reset_cmd as u16,
        Control1 => word(status.control1),
        Control2 => word(status.control2),
        Control3 => word(status.control3),
        _ => return None,
    })
}

fn forced_input(signal: Signal, forced: ForcedValue) -> u16 {
    if signal.signal_type() == SignalType::Bool {
        forced.as_bool() as u16
    } else {
        word(forced.as_word())
    }
}

fn actuator_fraction(status: &mut ProcessStatus, digital: Signal) -> &mut f64 {
    match digital {
        Signal::ValveInOnOff => &mut status.valve_in_fraction,
        Signal::ValveOutOnOff => &mut status.valve_out_fraction,
        _ => &mut status.heater_fraction,
    }
}

fn indicator(status: &mut ProcessStatus, signal: Signal) -> &mut bool {
    match signal {
        Signal::Indicator1 => &mut status.indicator1,
        Signal::Indicator2 => &mut status.indicator2,
        Signal::Indicator3 => &mut status.indicator3,
        _ => &mut status.indicator4,
    }
}

fn analog_monitor(status: &mut ProcessStatus, signal: Signal) -> &mut i32 {
    match signal {
        Signal::Analog1 => &mut status.analog1,
        Signal::Analog2 => &mut status.analog2,
        _ => &mut status.analog3,
    }
}

fn bit(addr: IoAddress) -> u8 {
    addr.bit.unwrap_or(0)
}

#[derive(Debug)]
pub struct IoSyncEngine {
    settings: SyncSettings,
    ton: Ton,
    /// Last raw value actually sent per input signal (bits as 0/1).
    last_sent: HashMap<Signal, u16>,
    /// Conflicting addresses already reported.
    warned: HashSet<(Direction, IoAddress)>,
    first_update: bool,
    force_write_until: Option<Instant>,
    outputs_released: bool,
    last_mode: Option<ControlMode>,
    cycles: u64,
}

impl Default for IoSyncEngine {
    fn default() -> Self {
        Self::new(SyncSettings::default())
    }
}

impl IoSyncEngine {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings,
            ton: Ton::new(settings.ton_window),
            last_sent: HashMap::new(),
            warned: HashSet::new(),
            first_update: true,
            force_write_until: None,
            outputs_released: false,
            last_mode: None,
            cycles: 0,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Number of distinct conflicting addresses reported so far.
    pub fn warned_conflicts(&self) -> usize {
        self.warned.len()
    }

    /// Re-send measurements, sliders, setpoints and mode switches every cycle
    /// until the window elapses. Called after connect and after a reload.
    pub fn start_force_write_window(&mut self, now: Instant) {
        self.force_write_until = Some(now + self.settings.force_write_window);
    }

    /// Forget what the controller has seen so the next pass writes every input.
    pub fn reset_for_connection(&mut self, now: Instant) {
        self.first_update = true;
        self.last_sent.clear();
        self.ton.clear();
        self.start_force_write_window(now);
        debug!("sync state reset for new connection");
    }

    /// Zero actuators and general command channels after the controller link
    /// is lost. Only applies in controller mode; logs once per episode.
    ///
    /// Returns true when this call started a new episode.
    pub fn release_outputs(&mut self, status: &mut ProcessStatus, mode: ControlMode) -> bool {
        if mode != ControlMode::Plc {
            return false;
        }
        status.zero_actuators();
        if self.outputs_released {
            return false;
        }
        self.outputs_released = true;
        info!("controller outputs released (no connection)");
        true
    }

    pub fn sync(&mut self, mut io: SyncIo<'_>) -> SyncResult<()> {
        if self.last_mode == Some(ControlMode::Plc) && io.mode == ControlMode::Gui {
            io.status.zero_actuators();
            info!("controller mode left, actuators released");
        }
        self.last_mode = Some(io.mode);

        if !io.adapter.is_connected() {
            return Err(AdapterError::NotConnected.into());
        }
        if io.mode == ControlMode::Plc {
            self.outputs_released = false;
        }

        self.read_outputs(&mut io)?;
        self.write_inputs(&mut io)?;

        self.first_update = false;
        self.cycles += 1;
        Ok(())
    }

    /// Enabled address of `signal`, unless it collides with another signal.
    fn usable_address(&mut self, map: &AddressMap, signal: Signal) -> Option<IoAddress> {
        let address = map.enabled_address(signal)?;
        let Some(conflict) = map
            .conflicts()
            .iter()
            .find(|c| c.first == signal || c.second == signal)
        else {
            return Some(address);
        };
        if self.warned.insert((conflict.direction, conflict.at)) {
            warn!(
                first = %map.signal_name(conflict.first),
                second = %map.signal_name(conflict.second),
                at = %conflict.at,
                "address conflict, neither signal is exchanged; adjust the signal map"
            );
        }
        None
    }

    fn read_outputs(&mut self, io: &mut SyncIo<'_>) -> SyncResult<()> {
        let controller_owns = io.status.control_source(io.mode) == ControlSource::Controller;
        for (digital, analog) in ACTUATORS {
            let fraction = if let Some(forced) = io.forced.get(digital) {
                Some(if forced.as_bool() { 1.0 } else { 0.0 })
            } else if let Some(forced) = io.forced.get(analog) {
                Some(raw_to_fraction(forced.as_word(), ANALOG_SPAN))
            } else if controller_owns {
                self.read_actuator(io.adapter, io.map, digital, analog)?
            } else {
                None
            };
            if let Some(fraction) = fraction {
                *actuator_fraction(io.status, digital) = fraction;
            }
        }

        let controller_mode = io.mode == ControlMode::Plc;
        for signal in INDICATORS {
            let value = match io.forced.get(signal) {
                Some(forced) => Some(forced.as_bool()),
                None if controller_mode => match self.usable_address(io.map, signal) {
                    Some(addr) => Some(io.adapter.get_digital_output(addr.byte, bit(addr))?),
                    None => None,
                },
                None => None,
            };
            if let Some(value) = value {
                *indicator(io.status, signal) = value;
            }
        }
        for signal in ANALOG_MONITORS {
            let value = match io.forced.get(signal) {
                Some(forced) => Some(forced.as_word()),
                None if controller_mode => match self.usable_address(io.map, signal) {
                    Some(addr) => Some(io.adapter.get_analog_output(addr.byte)? as i32),
                    None => None,
                },
                None => None,
            };
            if let Some(value) = value {
                *analog_monitor(io.status, signal) = value;
            }
        }
        Ok(())
    }

    /// Digital on wins over the analog position; a digital-only actuator
    /// reads as fully open or closed.
    fn read_actuator(
        &mut self,
        adapter: &mut dyn ProtocolAdapter,
        map: &AddressMap,
        digital: Signal,
        analog: Signal,
    ) -> SyncResult<Option<f64>> {
        let digital_addr = self.usable_address(map, digital);
        let analog_addr = self.usable_address(map, analog);

        if let Some(addr) = digital_addr
            && adapter.get_digital_output(addr.byte, bit(addr))?
        {
            return Ok(Some(1.0));
        }
        if let Some(addr) = analog_addr {
            let raw = adapter.get_analog_output(addr.byte)?;
            return Ok(Some(raw_to_fraction(raw as i32, ANALOG_SPAN)));
        }
        Ok(digital_addr.map(|_| 0.0))
    }

    fn write_inputs(&mut self, io: &mut SyncIo<'_>) -> SyncResult<()> {
        let first = self.first_update;
        let force_window = self.force_write_until.is_some_and(|until| io.now < until);

        for signal in Signal::ALL {
            let Some(policy) = write_policy(signal) else {
                continue;
            };
            let Some(addr) = self.usable_address(io.map, signal) else {
                continue;
            };
            let value = match io.forced.get(signal) {
                Some(forced) => forced_input(signal, forced),
                None => match input_value(signal, io.status, io.params) {
                    Some(value) => value,
                    None => continue,
                },
            };

            let changed = self.last_sent.get(&signal) != Some(&value);
            let send = match policy {
                WritePolicy::Switch => first || changed,
                WritePolicy::Analog => first || force_window || changed,
                WritePolicy::Command => {
                    let ready = self.ton.ready(signal, value != 0, io.now);
                    first || (ready && changed)
                }
                WritePolicy::Mode => {
                    let ready = self.ton.ready(signal, value != 0, io.now);
                    first || (ready && (force_window || changed))
                }
                WritePolicy::Button => changed,
            };
            if !send {
                continue;
            }

            match addr.bit {
                Some(bit) => {
                    io.adapter.set_digital_input(addr.byte, bit, value != 0)?;
                }
                None => {
                    io.adapter.set_analog_input(addr.byte, value)?;
                }
            }
            self.last_sent.insert(signal, value);
        }
        Ok(())
    }
}
