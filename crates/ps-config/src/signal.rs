//! Catalog of every process signal the simulator knows about.
//!
//! Direction is seen from the controller: a controller *output* is an actuator
//! command the simulator reads, a controller *input* is a sensor or operator
//! command the simulator writes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::{IoAddress, SignalType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    ControllerOutput,
    ControllerInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Signal {
    // Actuator commands
    ValveInOnOff,
    ValveOutOnOff,
    HeaterOnOff,
    ValveInPosition,
    ValveOutPosition,
    HeaterPower,
    // General-purpose controller outputs
    Indicator1,
    Indicator2,
    Indicator3,
    Indicator4,
    Analog1,
    Analog2,
    Analog3,
    // Sensors
    LevelHigh,
    LevelLow,
    LevelMeasurement,
    TemperatureMeasurement,
    // PID operator panel
    PidStart,
    PidStop,
    PidReset,
    AutoMode,
    ManualMode,
    TempAnalogControl,
    TempDigitalControl,
    LevelAnalogControl,
    LevelDigitalControl,
    TempSetpoint,
    LevelSetpoint,
    // General-purpose controller inputs
    Start,
    Stop,
    Reset,
    Control1,
    Control2,
    Control3,
}

/// Static description of one catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct SignalSpec {
    /// Stable attribute key, used in logs and forced-value tables.
    pub key: &'static str,
    /// Canonical name expected in signal map files.
    pub name: &'static str,
    /// Additional accepted names.
    pub aliases: &'static [&'static str],
    pub default_address: IoAddress,
}

impl Signal {
    pub const ALL: [Signal; 34] = [
        Signal::ValveInOnOff,
        Signal::ValveOutOnOff,
        Signal::HeaterOnOff,
        Signal::ValveInPosition,
        Signal::ValveOutPosition,
        Signal::HeaterPower,
        Signal::Indicator1,
        Signal::Indicator2,
        Signal::Indicator3,
        Signal::Indicator4,
        Signal::Analog1,
        Signal::Analog2,
        Signal::Analog3,
        Signal::LevelHigh,
        Signal::LevelLow,
        Signal::LevelMeasurement,
        Signal::TemperatureMeasurement,
        Signal::PidStart,
        Signal::PidStop,
        Signal::PidReset,
        Signal::AutoMode,
        Signal::ManualMode,
        Signal::TempAnalogControl,
        Signal::TempDigitalControl,
        Signal::LevelAnalogControl,
        Signal::LevelDigitalControl,
        Signal::TempSetpoint,
        Signal::LevelSetpoint,
        Signal::Start,
        Signal::Stop,
        Signal::Reset,
        Signal::Control1,
        Signal::Control2,
        Signal::Control3,
    ];

    pub fn spec(self) -> SignalSpec {
        use Signal::*;
        let (key, name, aliases, default_address): (_, _, &'static [&'static str], _) = match self
        {
            ValveInOnOff => (
                "DQValveIn",
                "Sim_InletValveOnOff",
                &["ValveIn", "UpperValve"],
                IoAddress::digital(0, 0),
            ),
            ValveOutOnOff => (
                "DQValveOut",
                "Sim_OutletValveOnOff",
                &["ValveOut", "LowerValve"],
                IoAddress::digital(0, 1),
            ),
            HeaterOnOff => (
                "DQHeater",
                "Sim_HeaterOnOff",
                &["Heater"],
                IoAddress::digital(0, 2),
            ),
            ValveInPosition => (
                "AQValveInFraction",
                "Sim_InletValvePosition",
                &["ValveInFraction", "UpperValveFraction"],
                IoAddress::word(2),
            ),
            ValveOutPosition => (
                "AQValveOutFraction",
                "Sim_OutletValvePosition",
                &["ValveOutFraction", "LowerValveFraction"],
                IoAddress::word(4),
            ),
            HeaterPower => (
                "AQHeaterFraction",
                "Sim_HeaterPowerLevel",
                &["HeaterFraction", "HeaterPower"],
                IoAddress::word(6),
            ),
            Indicator1 => ("DQGen_Indicator1", "Indicator1", &[], IoAddress::digital(0, 5)),
            Indicator2 => ("DQGen_Indicator2", "Indicator2", &[], IoAddress::digital(0, 6)),
            Indicator3 => ("DQGen_Indicator3", "Indicator3", &[], IoAddress::digital(0, 7)),
            Indicator4 => ("DQGen_Indicator4", "Indicator4", &[], IoAddress::digital(1, 0)),
            Analog1 => ("AQGen_Analog1", "Analog1", &[], IoAddress::word(12)),
            Analog2 => ("AQGen_Analog2", "Analog2", &[], IoAddress::word(14)),
            Analog3 => ("AQGen_Analog3", "Analog3", &[], IoAddress::word(16)),
            LevelHigh => (
                "DILevelSensorHigh",
                "Sim_WaterLevelHigh",
                &["LevelSensorHigh", "TanklevelSensorHigh"],
                IoAddress::digital(0, 0),
            ),
            LevelLow => (
                "DILevelSensorLow",
                "Sim_WaterLevelLow",
                &["LevelSensorLow", "TanklevelSensorLow"],
                IoAddress::digital(0, 1),
            ),
            LevelMeasurement => (
                "AILevelSensor",
                "Sim_WaterLevelMeasurement",
                &["LevelSensor", "TankLevel"],
                IoAddress::word(2),
            ),
            TemperatureMeasurement => (
                "AITemperatureSensor",
                "Sim_WaterTemperatureMeasurement",
                &["TemperatureSensor", "TankTemperature"],
                IoAddress::word(4),
            ),
            PidStart => ("DIStart", "Sim_StartButton", &[], IoAddress::digital(0, 5)),
            PidStop => ("DIStop", "Sim_StopButton", &[], IoAddress::digital(0, 6)),
            PidReset => ("DIReset", "Sim_ResetButton", &[], IoAddress::digital(0, 7)),
            AutoMode => ("DIAuto", "Sim_AutomaticMode", &[], IoAddress::digital(1, 0)),
            ManualMode => ("DIMan", "Sim_ManualMode", &[], IoAddress::digital(1, 1)),
            TempAnalogControl => (
                "AItemp",
                "Sim_TemperatureAnalogControl",
                &[],
                IoAddress::digital(1, 2),
            ),
            TempDigitalControl => (
                "DItemp",
                "Sim_TemperatureDigitalControl",
                &[],
                IoAddress::digital(1, 3),
            ),
            LevelAnalogControl => (
                "AIlevel",
                "Sim_WaterLevelAnalogControl",
                &[],
                IoAddress::digital(1, 4),
            ),
            LevelDigitalControl => (
                "DIlevel",
                "Sim_WaterLevelDigitalControl",
                &[],
                IoAddress::digital(1, 5),
            ),
            TempSetpoint => (
                "AITempSP",
                "Sim_TemperatureSetpoint",
                &[],
                IoAddress::word(12),
            ),
            LevelSetpoint => (
                "AILevelSP",
                "Sim_WaterLevelSetpoint",
                &[],
                IoAddress::word(14),
            ),
            Start => ("DIGen_Start", "Start", &[], IoAddress::digital(0, 2)),
            Stop => ("DIGen_Stop", "Stop", &[], IoAddress::digital(0, 3)),
            Reset => ("DIGen_Reset", "Reset", &[], IoAddress::digital(0, 4)),
            Control1 => ("AIGen_Control1", "Control1", &[], IoAddress::word(6)),
            Control2 => ("AIGen_Control2", "Control2", &[], IoAddress::word(8)),
            Control3 => ("AIGen_Control3", "Control3", &[], IoAddress::word(10)),
        };
        SignalSpec {
            key,
            name,
            aliases,
            default_address,
        }
    }

    pub fn key(self) -> &'static str {
        self.spec().key
    }

    pub fn default_address(self) -> IoAddress {
        self.spec().default_address
    }

    pub fn signal_type(self) -> SignalType {
        self.default_address().signal_type()
    }

    pub fn direction(self) -> Direction {
        use Signal::*;
        match self {
            ValveInOnOff | ValveOutOnOff | HeaterOnOff | ValveInPosition | ValveOutPosition
            | HeaterPower | Indicator1 | Indicator2 | Indicator3 | Indicator4 | Analog1
            | Analog2 | Analog3 => Direction::ControllerOutput,
            _ => Direction::ControllerInput,
        }
    }

    /// Look a signal up by attribute key, canonical name or alias.
    pub fn from_name(name: &str) -> Option<Signal> {
        Signal::ALL.into_iter().find(|s| {
            let spec = s.spec();
            spec.key == name || spec.name == name || spec.aliases.contains(&name)
        })
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_names_are_unique() {
        let mut seen = HashSet::new();
        for s in Signal::ALL {
            let spec = s.spec();
            assert!(seen.insert(spec.key), "duplicate key {}", spec.key);
            assert!(seen.insert(spec.name), "duplicate name {}", spec.name);
            for alias in spec.aliases {
                assert!(seen.insert(*alias), "duplicate alias {alias}");
            }
        }
    }

    #[test]
    fn lookup_by_any_name() {
        assert_eq!(Signal::from_name("DQValveIn"), Some(Signal::ValveInOnOff));
        assert_eq!(
            Signal::from_name("Sim_InletValveOnOff"),
            Some(Signal::ValveInOnOff)
        );
        assert_eq!(Signal::from_name("UpperValve"), Some(Signal::ValveInOnOff));
        assert_eq!(Signal::from_name("TankLevel"), Some(Signal::LevelMeasurement));
        assert_eq!(Signal::from_name("NoSuchSignal"), None);
    }

    #[test]
    fn defaults_match_direction_and_type() {
        assert_eq!(Signal::ValveInOnOff.direction(), Direction::ControllerOutput);
        assert_eq!(Signal::LevelHigh.direction(), Direction::ControllerInput);
        assert_eq!(Signal::HeaterPower.signal_type(), SignalType::Word);
        assert_eq!(Signal::AutoMode.signal_type(), SignalType::Bool);
        assert!(Signal::ALL.iter().all(|s| s.default_address().is_valid()));
    }
}
