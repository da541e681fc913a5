//! Mutable record of the current physical and command state.

use serde::{Deserialize, Serialize};

/// Who drives the actuators at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// The controller's outputs drive the valves and heater.
    #[default]
    Plc,
    /// The operator GUI drives them; controller outputs are ignored.
    Gui,
}

impl ControlMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlMode::Plc => "plc",
            ControlMode::Gui => "gui",
        }
    }

    pub fn parse(s: &str) -> Option<ControlMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plc" => Some(ControlMode::Plc),
            "gui" => Some(ControlMode::Gui),
            _ => None,
        }
    }
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved owner of the actuator fractions for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSource {
    Controller,
    Operator,
}

/// Momentary operator commands that can be pulse-stretched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Command {
    Start,
    Stop,
    Reset,
    PidStart,
    PidStop,
    PidReset,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Start,
        Command::Stop,
        Command::Reset,
        Command::PidStart,
        Command::PidStop,
        Command::PidReset,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessStatus {
    /// Inlet valve opening, 0..1 (controller, operator or import)
    pub valve_in_fraction: f64,
    /// Outlet valve opening, 0..1
    pub valve_out_fraction: f64,
    /// Heater power, 0..1
    pub heater_fraction: f64,

    /// Liquid volume in liters, `0 <= volume <= tank_volume`
    pub volume: f64,
    /// Liquid temperature in °C, `ambient <= temperature <= boiling`
    pub temperature: f64,
    pub level_high: bool,
    pub level_low: bool,
    /// Flow rates of the last tick (l/s)
    pub flow_in: f64,
    pub flow_out: f64,

    pub sim_running: bool,

    // General-purpose commands to the controller
    pub start_cmd: bool,
    pub stop_cmd: bool,
    pub reset_cmd: bool,
    pub control1: i32,
    pub control2: i32,
    pub control3: i32,

    // General-purpose values from the controller
    pub indicator1: bool,
    pub indicator2: bool,
    pub indicator3: bool,
    pub indicator4: bool,
    pub analog1: i32,
    pub analog2: i32,
    pub analog3: i32,

    // PID operator panel
    pub pid_start_cmd: bool,
    pub pid_stop_cmd: bool,
    pub pid_reset_cmd: bool,
    pub auto_mode: bool,
    pub manual_mode: bool,
    pub temp_analog_control: bool,
    pub temp_digital_control: bool,
    pub level_analog_control: bool,
    pub level_digital_control: bool,
    /// °C
    pub temp_setpoint: f64,
    /// liters
    pub level_setpoint: f64,
}

impl Default for ProcessStatus {
    fn default() -> Self {
        Self {
            valve_in_fraction: 0.0,
            valve_out_fraction: 0.0,
            heater_fraction: 0.0,
            volume: 100.0,
            temperature: 21.0,
            level_high: false,
            level_low: false,
            flow_in: 0.0,
            flow_out: 0.0,
            sim_running: false,
            start_cmd: false,
            stop_cmd: false,
            reset_cmd: false,
            control1: 0,
            control2: 0,
            control3: 0,
            indicator1: false,
            indicator2: false,
            indicator3: false,
            indicator4: false,
            analog1: 0,
            analog2: 0,
            analog3: 0,
            pid_start_cmd: false,
            pid_stop_cmd: false,
            pid_reset_cmd: false,
            auto_mode: true,
            manual_mode: false,
            temp_analog_control: true,
            temp_digital_control: false,
            level_analog_control: true,
            level_digital_control: false,
            temp_setpoint: 50.0,
            level_setpoint: 100.0,
        }
    }
}

impl ProcessStatus {
    /// Fields that survive save/load.
    pub const PERSISTED_FIELDS: &'static [&'static str] = &[
        "volume",
        "temperature",
        "valve_in_fraction",
        "valve_out_fraction",
        "heater_fraction",
        "start_cmd",
        "stop_cmd",
        "reset_cmd",
        "control1",
        "control2",
        "control3",
        "indicator1",
        "indicator2",
        "indicator3",
        "indicator4",
        "analog1",
        "analog2",
        "analog3",
        "pid_start_cmd",
        "pid_stop_cmd",
        "pid_reset_cmd",
        "auto_mode",
        "manual_mode",
        "temp_analog_control",
        "temp_digital_control",
        "level_analog_control",
        "level_digital_control",
        "temp_setpoint",
        "level_setpoint",
    ];

    /// Actuator owner given the top-level mode and the panel's auto/manual switches.
    ///
    /// In controller mode a manual-only panel hands the actuators to the operator;
    /// an ambiguous panel (both or neither set) follows the manual switch.
    pub fn control_source(&self, mode: ControlMode) -> ControlSource {
        match mode {
            ControlMode::Gui => ControlSource::Operator,
            ControlMode::Plc if self.manual_mode => ControlSource::Operator,
            ControlMode::Plc => ControlSource::Controller,
        }
    }

    pub fn command(&self, cmd: Command) -> bool {
        match cmd {
            Command::Start => self.start_cmd,
            Command::Stop => self.stop_cmd,
            Command::Reset => self.reset_cmd,
            Command::PidStart => self.pid_start_cmd,
            Command::PidStop => self.pid_stop_cmd,
            Command::PidReset => self.pid_reset_cmd,
        }
    }

    pub fn set_command(&mut self, cmd: Command, value: bool) {
        let slot = match cmd {
            Command::Start => &mut self.start_cmd,
            Command::Stop => &mut self.stop_cmd,
            Command::Reset => &mut self.reset_cmd,
            Command::PidStart => &mut self.pid_start_cmd,
            Command::PidStop => &mut self.pid_stop_cmd,
            Command::PidReset => &mut self.pid_reset_cmd,
        };
        *slot = value;
    }

    /// Release every actuator and operator command channel.
    ///
    /// Used when the controller link drops or control is taken away from it.
    pub fn zero_actuators(&mut self) {
        self.valve_in_fraction = 0.0;
        self.valve_out_fraction = 0.0;
        self.heater_fraction = 0.0;
        self.start_cmd = false;
        self.stop_cmd = false;
        self.reset_cmd = false;
        self.control1 = 0;
        self.control2 = 0;
        self.control3 = 0;
    }

    /// Select automatic mode on the operator panel.
    pub fn force_auto(&mut self) {
        self.auto_mode = true;
        self.manual_mode = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_mode_names() {
        assert_eq!(ControlMode::parse(" GUI "), Some(ControlMode::Gui));
        assert_eq!(ControlMode::parse("plc"), Some(ControlMode::Plc));
        assert_eq!(ControlMode::parse("remote"), None);
        assert_eq!(ControlMode::Gui.to_string(), "gui");
    }

    #[test]
    fn control_source_rules() {
        let mut status = ProcessStatus::default();
        assert_eq!(status.control_source(ControlMode::Gui), ControlSource::Operator);
        assert_eq!(status.control_source(ControlMode::Plc), ControlSource::Controller);

        status.auto_mode = false;
        status.manual_mode = true;
        assert_eq!(status.control_source(ControlMode::Plc), ControlSource::Operator);

        // Ambiguous panel follows the manual switch.
        status.auto_mode = true;
        assert_eq!(status.control_source(ControlMode::Plc), ControlSource::Operator);
        status.manual_mode = false;
        status.auto_mode = false;
        assert_eq!(status.control_source(ControlMode::Plc), ControlSource::Controller);
    }

    #[test]
    fn zero_actuators_leaves_process_values() {
        let mut status = ProcessStatus {
            valve_in_fraction: 0.7,
            heater_fraction: 1.0,
            start_cmd: true,
            control2: 1234,
            volume: 42.0,
            ..Default::default()
        };
        status.zero_actuators();
        assert_eq!(status.valve_in_fraction, 0.0);
        assert_eq!(status.heater_fraction, 0.0);
        assert!(!status.start_cmd);
        assert_eq!(status.control2, 0);
        assert_eq!(status.volume, 42.0);
    }

    #[test]
    fn commands_by_key() {
        let mut status = ProcessStatus::default();
        for cmd in Command::ALL {
            status.set_command(cmd, true);
            assert!(status.command(cmd));
        }
        assert!(status.pid_reset_cmd && status.start_cmd);
    }
}
