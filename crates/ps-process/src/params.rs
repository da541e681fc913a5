//! Physical constants of the tank process.

use ps_core::ensure_finite;
use serde::{Deserialize, Serialize};

use crate::error::{ProcessError, ProcessResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankParams {
    /// Nominal tick interval in seconds; sizes the delay history.
    pub simulation_interval: f64,
    /// liters
    pub tank_volume: f64,
    /// l/s at fully open
    pub valve_in_max_flow: f64,
    pub valve_out_max_flow: f64,
    /// Transport delay applied to valve positions (s)
    pub volume_delay: f64,
    /// °C
    pub ambient_temp: f64,
    /// liters
    pub level_high_trigger: f64,
    pub level_low_trigger: f64,
    /// W
    pub heater_max_power: f64,
    /// W/K
    pub tank_heat_loss: f64,
    /// Transport delay applied to the heater fraction (s)
    pub temperature_delay: f64,
    /// J/(kg·K)
    pub specific_heat_capacity: f64,
    /// kg/l
    pub specific_weight: f64,
    /// °C
    pub boiling_temp: f64,
}

impl Default for TankParams {
    fn default() -> Self {
        let tank_volume = 200.0;
        Self {
            simulation_interval: 0.1,
            tank_volume,
            valve_in_max_flow: 5.0,
            valve_out_max_flow: 2.0,
            volume_delay: 0.0,
            ambient_temp: 21.0,
            level_high_trigger: 0.9 * tank_volume,
            level_low_trigger: 0.1 * tank_volume,
            heater_max_power: 15000.0,
            tank_heat_loss: 150.0,
            temperature_delay: 0.0,
            specific_heat_capacity: 4186.0,
            specific_weight: 0.997,
            boiling_temp: 100.0,
        }
    }
}

impl TankParams {
    /// Fields that survive save/load.
    pub const PERSISTED_FIELDS: &'static [&'static str] = &[
        "simulation_interval",
        "tank_volume",
        "valve_in_max_flow",
        "valve_out_max_flow",
        "volume_delay",
        "ambient_temp",
        "level_high_trigger",
        "level_low_trigger",
        "heater_max_power",
        "tank_heat_loss",
        "temperature_delay",
        "specific_heat_capacity",
        "specific_weight",
        "boiling_temp",
    ];

    /// Usable tank capacity, never negative.
    pub fn capacity(&self) -> f64 {
        if self.tank_volume.is_finite() {
            self.tank_volume.max(0.0)
        } else {
            0.0
        }
    }

    /// Upper temperature bound, never below ambient.
    pub fn max_temp(&self) -> f64 {
        self.boiling_temp.max(self.ambient_temp)
    }

    /// Reject values a user edit or a settings file should not carry.
    ///
    /// The model itself tolerates anything; this is for the config boundary.
    pub fn validate(&self) -> ProcessResult<()> {
        let fields = [
            ("simulation_interval", self.simulation_interval),
            ("tank_volume", self.tank_volume),
            ("valve_in_max_flow", self.valve_in_max_flow),
            ("valve_out_max_flow", self.valve_out_max_flow),
            ("volume_delay", self.volume_delay),
            ("ambient_temp", self.ambient_temp),
            ("level_high_trigger", self.level_high_trigger),
            ("level_low_trigger", self.level_low_trigger),
            ("heater_max_power", self.heater_max_power),
            ("tank_heat_loss", self.tank_heat_loss),
            ("temperature_delay", self.temperature_delay),
            ("specific_heat_capacity", self.specific_heat_capacity),
            ("specific_weight", self.specific_weight),
            ("boiling_temp", self.boiling_temp),
        ];
        for (name, value) in fields {
            let value = ensure_finite(value, name)?;
            if name != "ambient_temp" && name != "boiling_temp" && value < 0.0 {
                return Err(ProcessError::Negative { name, value });
            }
        }
        for (name, value) in [
            ("simulation_interval", self.simulation_interval),
            ("specific_heat_capacity", self.specific_heat_capacity),
            ("specific_weight", self.specific_weight),
        ] {
            if value <= 0.0 {
                return Err(ProcessError::NotPositive { name, value });
            }
        }
        Ok(())
    }
}
